//! Fixed-capacity allocators
//!
//! Every allocator owns one arena sized at construction and never grows it.
//!
//! | Allocator | Free | Notes |
//! |---|---|---|
//! | [`MonotonicAllocator`] | bulk only | bump cursor, checkpoints |
//! | [`StackAllocator`] | strict LIFO | per-allocation header, markers |
//! | [`PoolAllocator`] | any order | uniform blocks, O(1) |
//! | [`MultipoolAllocator`] | any order | power-of-two block tiers, O(1) |
//!
//! All of them are `Send` but not `Sync`: an allocator has a single owner and
//! is never shared across threads.

// Core allocator types
mod arena;
mod boxed;
mod free_list;
mod stats;
mod traits;

// Allocator implementations
pub mod monotonic;
pub mod multipool;
pub mod pool;
pub mod stack;

// Re-exports for convenience
pub use boxed::ArenaBox;
pub use free_list::BLOCK_ALIGN;
pub use monotonic::{Checkpoint, MonotonicAllocator};
pub use multipool::{DEFAULT_DEPTH, DepthInfo, MultipoolAllocator};
pub use pool::PoolAllocator;
pub use stack::{StackAllocator, StackMarker};
pub use stats::AllocatorStats;
pub use traits::{
    Allocator, BlockAllocator, Deallocator, MemoryUsage, Resettable, StatisticsProvider,
};

/// Reports a broken caller contract and panics
///
/// Runs before any allocator state is touched, so the allocator is still
/// consistent if the panic is caught.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn contract_violation(allocator: &'static str, message: core::fmt::Arguments<'_>) -> ! {
    #[cfg(feature = "logging")]
    tracing::error!(allocator, %message, "allocator contract violation");

    panic!("{allocator}: {message}");
}
