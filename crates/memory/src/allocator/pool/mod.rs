//! Fixed-size block pool
//!
//! ## Modules
//! - `allocator` - Main `PoolAllocator` over an index-linked free list

pub mod allocator;

pub use allocator::PoolAllocator;
