//! Fixed-capacity arena allocators
//!
//! This crate provides a family of allocators that each manage one arena
//! reserved up front, with no general-purpose heap traffic after
//! construction:
//!
//! - [`MonotonicAllocator`](allocator::MonotonicAllocator): bump pointer,
//!   bulk reclamation only
//! - [`StackAllocator`](allocator::StackAllocator): strict LIFO with
//!   per-allocation headers
//! - [`PoolAllocator`](allocator::PoolAllocator): uniform blocks on an
//!   intrusive free list
//! - [`MultipoolAllocator`](allocator::MultipoolAllocator): power-of-two block
//!   tiers sharing one arena
//!
//! Running out of capacity is reported as `None` from `allocate`. Broken
//! caller contracts (zero-size requests, bad alignments, foreign pointers,
//! double frees, out-of-order stack frees) panic instead of corrupting memory.
//! Releasing a single raw allocation is `unsafe`; [`ArenaBox`] owns a value
//! and releases its block on drop.
//!
//! [`ArenaBox`]: allocator::ArenaBox
//!
//! # Features
//!
//! - `logging` (default): emits `tracing` events on construction, reset,
//!   exhaustion and contract violations
//!
//! # Example
//!
//! ```
//! use strata_memory::prelude::*;
//!
//! fn main() -> strata_memory::Result<()> {
//!     let pool = PoolAllocator::new(16, 64)?;
//!
//!     let block = pool.allocate(48, 8).or_alloc_error(48, 8)?;
//!     assert_eq!(pool.allocation_capacity(Some(block)), 64);
//!     // SAFETY: `block` is owned here and nothing points into it.
//!     unsafe { pool.free(block) };
//!
//!     let value = ArenaBox::try_new_in([0u32; 8], &pool)?;
//!     assert_eq!(value.len(), 8);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]

// Core modules
pub mod allocator;
pub mod config;
pub mod error;
pub mod utils;

// Re-export common types for convenience
pub use config::AllocatorConfig;
pub use error::{MemoryError, MemoryResult, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types and traits
pub mod prelude {
    pub use crate::allocator::{
        Allocator, AllocatorStats, ArenaBox, BlockAllocator, Deallocator, MemoryUsage,
        MonotonicAllocator, MultipoolAllocator, PoolAllocator, Resettable, StackAllocator,
        StatisticsProvider,
    };
    pub use crate::config::AllocatorConfig;
    pub use crate::error::{MemoryError, MemoryResult, OptionExt};
}
