//! Main pool allocator implementation
//!
//! ## Invariants
//!
//! - All blocks are `block_size` bytes of data behind a `BLOCK_ALIGN` aligned
//!   header span, so every returned pointer is `BLOCK_ALIGN` aligned
//! - Free list contains only unallocated blocks; allocated blocks carry the
//!   live tag in their header
//! - Block pointers are validated on free (bounds, block boundary, live tag)
//! - `memory_usage` is always `allocation_count * block_size`

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::allocator::arena::Arena;
use crate::allocator::free_list::{BLOCK_ALIGN, BlockLookup, FreeList};
use crate::allocator::stats::Counters;
use crate::allocator::traits::{check_request, is_valid_request};
use crate::allocator::{
    Allocator, AllocatorStats, BlockAllocator, Deallocator, MemoryUsage, Resettable,
    StatisticsProvider, contract_violation,
};
use crate::config::AllocatorConfig;
use crate::error::{MemoryError, MemoryResult};

/// Pool allocator for fixed-size blocks
///
/// Every successful allocation hands out a whole block, whatever the
/// requested size, in O(1).
///
/// # Memory Layout
/// ```text
/// [hdr|Block0][hdr|Block1][hdr|Block2][hdr|Block3]...[hdr|BlockN]
///       ↓           ↓           ↓           ↓               ↓
///     [free] →    [free] →    [live]      [free] →  ...   NONE
/// ```
///
/// # Examples
/// ```
/// use strata_memory::allocator::{Allocator, Deallocator, PoolAllocator};
///
/// let pool = PoolAllocator::new(1, 64).unwrap();
/// let block = pool.allocate(48, 8).unwrap();
/// assert!(pool.allocate(8, 8).is_none());
///
/// // SAFETY: `block` came from this pool and nothing borrows it.
/// unsafe { pool.free(block) };
/// assert_eq!(pool.allocate(64, 16), Some(block));
/// ```
#[derive(Debug)]
pub struct PoolAllocator {
    arena: Arena,
    blocks: FreeList,
    counters: Counters,
    config: AllocatorConfig,
}

impl PoolAllocator {
    /// Creates a pool of `block_count` blocks of `block_size` bytes with
    /// default configuration
    pub fn new(block_count: usize, block_size: usize) -> MemoryResult<Self> {
        Self::with_config(block_count, block_size, AllocatorConfig::default())
    }

    /// Creates a pool of `block_count` blocks of `block_size` bytes
    pub fn with_config(
        block_count: usize,
        block_size: usize,
        config: AllocatorConfig,
    ) -> MemoryResult<Self> {
        if block_count == 0 {
            return Err(MemoryError::invalid_config("block_count must be non-zero"));
        }
        if block_size == 0 {
            return Err(MemoryError::invalid_config("block_size must be non-zero"));
        }

        let span = FreeList::span_for(block_size, block_count)
            .ok_or_else(|| MemoryError::size_overflow("pool arena size"))?;
        let max_size = block_count
            .checked_mul(block_size)
            .ok_or_else(|| MemoryError::size_overflow("pool capacity"))?;

        let arena = Arena::new(span, BLOCK_ALIGN)?;
        let blocks = FreeList::new(0, block_size, block_count, 0);
        blocks.link(&arena, None);

        #[cfg(feature = "logging")]
        debug!(block_count, block_size, arena = span, "pool allocator created");

        Ok(Self {
            arena,
            blocks,
            counters: Counters::new(max_size, config.track_stats),
            config,
        })
    }

    /// Size of each individual block
    #[inline]
    pub fn block_size(&self) -> usize {
        self.blocks.block_size()
    }

    /// Total number of blocks
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.count()
    }

    /// Number of blocks currently on the free list
    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.blocks.free_count()
    }

    /// Active configuration
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Checks whether `ptr` points into this pool's arena
    #[inline]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.arena.offset_of(ptr).is_some()
    }

    #[inline]
    fn fits_block(&self, size: usize, alignment: usize) -> bool {
        size <= self.blocks.block_size() && alignment <= BLOCK_ALIGN
    }

    /// Resolves `ptr` to a live block index, panicking on foreign pointers,
    /// pointers off a block boundary and blocks that are not allocated
    fn live_block(&self, ptr: NonNull<u8>, operation: &str) -> usize {
        let Some(offset) = self.arena.offset_of(ptr) else {
            contract_violation(
                "pool",
                format_args!("{operation} of {ptr:p}: pointer does not belong to this pool"),
            );
        };

        let index = match self.blocks.lookup(offset) {
            BlockLookup::Block(index) => index,
            BlockLookup::Outside | BlockLookup::Misaligned => contract_violation(
                "pool",
                format_args!("{operation} of {ptr:p}: not a block boundary"),
            ),
        };

        if !self.blocks.is_live(&self.arena, index) {
            contract_violation(
                "pool",
                format_args!("{operation} of {ptr:p}: double free (block {index} is not allocated)"),
            );
        }

        index
    }
}

impl Allocator for PoolAllocator {
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        check_request("pool", size, alignment);

        if !self.fits_block(size, alignment) {
            #[cfg(feature = "logging")]
            trace!(
                size,
                alignment,
                block_size = self.blocks.block_size(),
                "request exceeds pool block geometry"
            );
            self.counters.record_failure();
            return None;
        }

        let Some(index) = self.blocks.pop(&self.arena) else {
            #[cfg(feature = "logging")]
            trace!(size, block_count = self.blocks.count(), "pool exhausted");
            self.counters.record_failure();
            return None;
        };

        let offset = self.blocks.data_offset(index);
        if let Some(byte) = self.config.alloc_pattern {
            self.arena.fill(offset, self.blocks.block_size(), byte);
        }
        self.counters.record_alloc(self.blocks.block_size());

        Some(self.arena.ptr_at(offset))
    }

    fn can_allocate(&self, size: usize, alignment: usize) -> bool {
        is_valid_request(size, alignment)
            && self.fits_block(size, alignment)
            && !self.blocks.is_empty()
    }
}

impl Deallocator for PoolAllocator {
    unsafe fn free(&self, ptr: NonNull<u8>) {
        let index = self.live_block(ptr, "free");

        if let Some(byte) = self.config.dealloc_pattern {
            self.arena
                .fill(self.blocks.data_offset(index), self.blocks.block_size(), byte);
        }

        self.blocks.push(&self.arena, index);
        self.counters.record_free(self.blocks.block_size());
    }
}

impl BlockAllocator for PoolAllocator {
    /// Every block has the same capacity, so any pointer reports
    /// `block_size`
    fn allocation_capacity(&self, ptr: Option<NonNull<u8>>) -> usize {
        ptr.map_or(0, |_| self.blocks.block_size())
    }

    /// Blocks never move: the same pointer comes back while `new_size`
    /// fits in a block, `None` otherwise
    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        check_request("pool", new_size, 1);
        self.live_block(ptr, "reallocate");

        if new_size > self.blocks.block_size() {
            self.counters.record_failure();
            return None;
        }
        Some(ptr)
    }
}

impl Resettable for PoolAllocator {
    fn clear(&mut self) {
        #[cfg(feature = "logging")]
        debug!(released = self.counters.count(), "pool allocator cleared");

        self.blocks.link(&self.arena, self.config.dealloc_pattern);
        self.counters.clear();
    }
}

impl MemoryUsage for PoolAllocator {
    #[inline]
    fn max_size(&self) -> usize {
        self.counters.total_size()
    }

    #[inline]
    fn memory_usage(&self) -> usize {
        self.counters.used()
    }

    #[inline]
    fn allocation_count(&self) -> usize {
        self.counters.count()
    }
}

impl StatisticsProvider for PoolAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.counters.snapshot()
    }

    fn reset_statistics(&self) {
        self.counters.reset_extended();
    }

    fn statistics_enabled(&self) -> bool {
        self.counters.is_tracking()
    }
}
