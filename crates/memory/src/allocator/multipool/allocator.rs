//! Main multipool allocator implementation
//!
//! One arena is split into `pool_depth + 1` runs of blocks, one per depth
//! level, laid out back to back:
//!
//! ```text
//! | depth 0: N blocks of S | depth 1: 2N blocks of S/2 | ... | depth D |
//! ```
//!
//! Each run has its own free list; the list heads play the role of access
//! headers. Allocated blocks record their depth in the header so that
//! `free` needs nothing but the pointer.
//!
//! A request is served by exactly one depth. When that depth is exhausted
//! the request fails even if another depth has room: the lookup stays O(1)
//! and a larger block is never silently spent on a small request.

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use super::depth::{DepthInfo, select_depth};
use crate::allocator::arena::Arena;
use crate::allocator::free_list::{BLOCK_ALIGN, BlockHeader, BlockLookup, FreeList, HEADER_SPAN};
use crate::allocator::stats::Counters;
use crate::allocator::traits::{check_request, is_valid_request};
use crate::allocator::{
    Allocator, AllocatorStats, BlockAllocator, Deallocator, MemoryUsage, Resettable,
    StatisticsProvider, contract_violation,
};
use crate::config::AllocatorConfig;
use crate::error::{MemoryError, MemoryResult};

/// Depth used by [`MultipoolAllocator::with_default_depth`]: two levels
pub const DEFAULT_DEPTH: usize = 1;

/// Multi-tier pool allocator
///
/// # Examples
/// ```
/// use strata_memory::allocator::{Allocator, MemoryUsage, MultipoolAllocator};
///
/// // depth 0: 1 x 256 bytes, depth 1: 2 x 128 bytes
/// let pool = MultipoolAllocator::new(1, 256, 1).unwrap();
/// assert_eq!(pool.max_size(), 512);
///
/// assert!(pool.allocate(200, 8).is_some());
/// // depth 0 is exhausted; depth 1 blocks are too small for 200 bytes
/// assert!(pool.allocate(200, 8).is_none());
/// assert!(pool.allocate(100, 8).is_some());
/// ```
#[derive(Debug)]
pub struct MultipoolAllocator {
    arena: Arena,
    depths: Box<[FreeList]>,
    block_size: usize,
    counters: Counters,
    config: AllocatorConfig,
}

impl MultipoolAllocator {
    /// Creates a multipool with default configuration
    ///
    /// Depth `d` in `0..=pool_depth` holds `block_count << d` blocks of
    /// `block_size >> d` bytes.
    pub fn new(block_count: usize, block_size: usize, pool_depth: usize) -> MemoryResult<Self> {
        Self::with_config(block_count, block_size, pool_depth, AllocatorConfig::default())
    }

    /// Creates a two-level multipool ([`DEFAULT_DEPTH`])
    pub fn with_default_depth(block_count: usize, block_size: usize) -> MemoryResult<Self> {
        Self::new(block_count, block_size, DEFAULT_DEPTH)
    }

    /// Creates a multipool with the given configuration
    pub fn with_config(
        block_count: usize,
        block_size: usize,
        pool_depth: usize,
        config: AllocatorConfig,
    ) -> MemoryResult<Self> {
        if block_count == 0 {
            return Err(MemoryError::invalid_config("block_count must be non-zero"));
        }
        if block_size == 0 {
            return Err(MemoryError::invalid_config("block_size must be non-zero"));
        }
        if pool_depth >= usize::BITS as usize || block_size % (1usize << pool_depth) != 0 {
            return Err(MemoryError::invalid_config(
                "block_size must be divisible by 2^pool_depth",
            ));
        }

        let mut depths = Vec::with_capacity(pool_depth + 1);
        let mut region = 0usize;
        for depth in 0..=pool_depth {
            let depth_size = block_size >> depth;
            let depth_count = block_count
                .checked_mul(1usize << depth)
                .ok_or_else(|| MemoryError::size_overflow("multipool block count"))?;
            let span = FreeList::span_for(depth_size, depth_count)
                .ok_or_else(|| MemoryError::size_overflow("multipool depth size"))?;

            depths.push(FreeList::new(region, depth_size, depth_count, depth));
            region = region
                .checked_add(span)
                .ok_or_else(|| MemoryError::size_overflow("multipool arena size"))?;
        }

        let max_size = block_count
            .checked_mul(block_size)
            .and_then(|level| level.checked_mul(pool_depth + 1))
            .ok_or_else(|| MemoryError::size_overflow("multipool capacity"))?;

        let arena = Arena::new(region, BLOCK_ALIGN)?;
        for list in &depths {
            list.link(&arena, None);
        }

        #[cfg(feature = "logging")]
        debug!(
            block_count,
            block_size,
            pool_depth,
            arena = region,
            "multipool allocator created"
        );

        Ok(Self {
            arena,
            depths: depths.into_boxed_slice(),
            block_size,
            counters: Counters::new(max_size, config.track_stats),
            config,
        })
    }

    /// Deepest depth index
    #[inline]
    pub fn pool_depth(&self) -> usize {
        self.depths.len() - 1
    }

    /// Block size at depth 0
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Bytes per block at depth `depth`
    ///
    /// # Panics
    /// If `depth > pool_depth()`.
    pub fn depth_block_size(&self, depth: usize) -> usize {
        self.depths[depth].block_size()
    }

    /// Number of blocks at depth `depth`
    ///
    /// # Panics
    /// If `depth > pool_depth()`.
    pub fn depth_block_count(&self, depth: usize) -> usize {
        self.depths[depth].count()
    }

    /// Blocks currently free at depth `depth`
    ///
    /// # Panics
    /// If `depth > pool_depth()`.
    pub fn free_blocks(&self, depth: usize) -> usize {
        self.depths[depth].free_count()
    }

    /// Depth that would serve a request of `size` bytes, `None` when no
    /// block is large enough
    pub fn depth_for(&self, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        select_depth(self.block_size, self.pool_depth(), size)
    }

    /// Snapshot of every depth level, shallowest first
    pub fn levels(&self) -> impl Iterator<Item = DepthInfo> + '_ {
        self.depths.iter().enumerate().map(|(depth, list)| DepthInfo {
            depth,
            block_size: list.block_size(),
            block_count: list.count(),
            free_blocks: list.free_count(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Checks whether `ptr` points into this allocator's arena
    #[inline]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.arena.offset_of(ptr).is_some()
    }

    /// Depth serving `size` bytes at `alignment`, `None` when no depth can
    #[inline]
    fn target_depth(&self, size: usize, alignment: usize) -> Option<usize> {
        if alignment > BLOCK_ALIGN {
            return None;
        }
        select_depth(self.block_size, self.pool_depth(), size)
    }

    /// Resolves `ptr` to `(depth, block index)` of a live block, panicking on
    /// foreign pointers, pointers off a block boundary and blocks that are not
    /// allocated
    ///
    /// The depth comes from the block header; the offset is then checked
    /// against that single depth's run.
    fn live_block(&self, ptr: NonNull<u8>, operation: &str) -> (usize, usize) {
        let Some(offset) = self.arena.offset_of(ptr) else {
            contract_violation(
                "multipool",
                format_args!("{operation} of {ptr:p}: pointer does not belong to this allocator"),
            );
        };

        let routed = offset
            .checked_sub(HEADER_SPAN)
            .map(|header_offset| self.arena.read::<BlockHeader>(header_offset).depth)
            .and_then(|depth| Some((depth, self.depths.get(depth)?.lookup(offset))));
        let Some((depth, BlockLookup::Block(index))) = routed else {
            contract_violation(
                "multipool",
                format_args!("{operation} of {ptr:p}: not a block boundary"),
            );
        };

        if !self.depths[depth].is_live(&self.arena, index) {
            contract_violation(
                "multipool",
                format_args!(
                    "{operation} of {ptr:p}: double free (depth {depth} block {index} is not allocated)"
                ),
            );
        }

        (depth, index)
    }

    /// Pops a block at `depth` and accounts for it
    fn take(&self, depth: usize) -> Option<usize> {
        let list = &self.depths[depth];
        let index = list.pop(&self.arena)?;

        if let Some(byte) = self.config.alloc_pattern {
            self.arena.fill(list.data_offset(index), list.block_size(), byte);
        }
        Some(index)
    }

    /// Pushes a block back on its depth's free list
    fn release(&self, depth: usize, index: usize) {
        let list = &self.depths[depth];
        if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(list.data_offset(index), list.block_size(), byte);
        }
        list.push(&self.arena, index);
    }
}

impl Allocator for MultipoolAllocator {
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        check_request("multipool", size, alignment);

        let Some(depth) = self.target_depth(size, alignment) else {
            #[cfg(feature = "logging")]
            trace!(
                size,
                alignment,
                block_size = self.block_size,
                "request exceeds multipool block geometry"
            );
            self.counters.record_failure();
            return None;
        };

        let Some(index) = self.take(depth) else {
            #[cfg(feature = "logging")]
            trace!(size, depth, "multipool depth exhausted");
            self.counters.record_failure();
            return None;
        };

        let list = &self.depths[depth];
        self.counters.record_alloc(list.block_size());
        Some(self.arena.ptr_at(list.data_offset(index)))
    }

    fn can_allocate(&self, size: usize, alignment: usize) -> bool {
        is_valid_request(size, alignment)
            && self
                .target_depth(size, alignment)
                .is_some_and(|depth| !self.depths[depth].is_empty())
    }
}

impl Deallocator for MultipoolAllocator {
    unsafe fn free(&self, ptr: NonNull<u8>) {
        let (depth, index) = self.live_block(ptr, "free");
        self.release(depth, index);
        self.counters.record_free(self.depths[depth].block_size());
    }
}

impl BlockAllocator for MultipoolAllocator {
    /// Block size of the depth `ptr` was served from
    ///
    /// # Panics
    /// If `ptr` is not a live block of this allocator.
    fn allocation_capacity(&self, ptr: Option<NonNull<u8>>) -> usize {
        ptr.map_or(0, |ptr| {
            let (depth, _) = self.live_block(ptr, "allocation_capacity");
            self.depths[depth].block_size()
        })
    }

    /// Keeps the block while `new_size` fits it, otherwise moves the data to
    /// a block of the depth that fits `new_size`
    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        check_request("multipool", new_size, 1);

        let (depth, index) = self.live_block(ptr, "reallocate");
        let old_size = self.depths[depth].block_size();
        if new_size <= old_size {
            return Some(ptr);
        }

        let Some((new_depth, new_index)) = select_depth(self.block_size, self.pool_depth(), new_size)
            .and_then(|new_depth| Some((new_depth, self.take(new_depth)?)))
        else {
            #[cfg(feature = "logging")]
            trace!(new_size, depth, "multipool cannot grow allocation");
            self.counters.record_failure();
            return None;
        };

        let target = &self.depths[new_depth];
        self.arena.copy_within(
            self.depths[depth].data_offset(index),
            target.data_offset(new_index),
            old_size,
        );
        self.release(depth, index);
        self.counters.record_resize(old_size, target.block_size());

        Some(self.arena.ptr_at(target.data_offset(new_index)))
    }
}

impl Resettable for MultipoolAllocator {
    fn clear(&mut self) {
        #[cfg(feature = "logging")]
        debug!(released = self.counters.count(), "multipool allocator cleared");

        for list in &*self.depths {
            list.link(&self.arena, self.config.dealloc_pattern);
        }
        self.counters.clear();
    }
}

impl MemoryUsage for MultipoolAllocator {
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

impl StatisticsProvider for MultipoolAllocator {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_aligned;
    use pretty_assertions::assert_eq;

    #[test]
    fn geometry_per_depth() {
        let pool = MultipoolAllocator::new(2, 64, 2).unwrap();
        let levels: Vec<_> = pool.levels().map(|l| (l.block_size, l.block_count)).collect();
        assert_eq!(levels, vec![(64, 2), (32, 4), (16, 8)]);
        assert_eq!(pool.max_size(), 3 * 2 * 64);
    }

    #[test]
    fn usage_follows_depth_block_size() {
        let pool = MultipoolAllocator::new(1, 64, 1).unwrap();
        let big = pool.allocate(40, 8).unwrap();
        let small = pool.allocate(20, 8).unwrap();
        assert_eq!(pool.memory_usage(), 64 + 32);
        assert_eq!(pool.allocation_capacity(Some(big)), 64);
        assert_eq!(pool.allocation_capacity(Some(small)), 32);

        // SAFETY: big is owned here and never dereferenced.
        unsafe { pool.free(big) };
        assert_eq!(pool.memory_usage(), 32);
        assert_eq!(pool.free_blocks(0), 1);
    }

    #[test]
    fn free_routes_by_header_depth() {
        let pool = MultipoolAllocator::new(1, 64, 2).unwrap();
        let blocks = [
            pool.allocate(64, 8).unwrap(),
            pool.allocate(32, 8).unwrap(),
            pool.allocate(16, 8).unwrap(),
        ];
        let free_before: Vec<usize> = (0..=2).map(|depth| pool.free_blocks(depth)).collect();
        assert_eq!(free_before, vec![0, 1, 3]);

        for (depth, block) in blocks.into_iter().enumerate().rev() {
            // SAFETY: each block is owned here and never dereferenced.
            unsafe { pool.free(block) };
            assert_eq!(pool.free_blocks(depth), free_before[depth] + 1);
        }
        assert_eq!(pool.memory_usage(), 0);
    }

    #[test]
    fn every_block_is_aligned() {
        let pool = MultipoolAllocator::new(2, 48, 1).unwrap();
        while let Some(ptr) = pool.allocate(24, 16) {
            assert!(is_aligned(ptr.as_ptr() as usize, BLOCK_ALIGN));
        }
        assert_eq!(pool.free_blocks(1), 0);
        assert_eq!(pool.free_blocks(0), 2);
    }

    #[test]
    fn reallocate_moves_to_larger_depth() {
        let pool = MultipoolAllocator::new(1, 64, 1).unwrap();
        let small = pool.allocate(16, 8).unwrap();
        // SAFETY: small is a live 32-byte block.
        unsafe { small.as_ptr().write_bytes(0x5A, 32) };

        // SAFETY: no reference into small is alive across the calls.
        assert_eq!(unsafe { pool.reallocate(small, 32) }, Some(small));

        let moved = unsafe { pool.reallocate(small, 48) }.unwrap();
        assert_ne!(moved, small);
        assert_eq!(pool.allocation_count(), 1);
        assert_eq!(pool.memory_usage(), 64);
        assert_eq!(pool.free_blocks(1), 2);
        // SAFETY: moved is a live 64-byte block whose first 32 bytes were copied.
        let bytes = unsafe { core::slice::from_raw_parts(moved.as_ptr(), 32) };
        assert!(bytes.iter().all(|&b| b == 0x5A));

        assert_eq!(unsafe { pool.reallocate(moved, 65) }, None);
    }

    #[test]
    fn clear_rebuilds_all_depths() {
        let mut pool = MultipoolAllocator::new(1, 32, 1).unwrap();
        pool.allocate(32, 8).unwrap();
        pool.allocate(16, 8).unwrap();
        pool.allocate(16, 8).unwrap();
        assert!(!pool.can_allocate(1, 1));

        pool.clear();
        assert_eq!(pool.free_blocks(0), 1);
        assert_eq!(pool.free_blocks(1), 2);
        assert_eq!(pool.memory_usage(), 0);
    }

    #[test]
    fn invalid_construction() {
        assert!(MultipoolAllocator::new(0, 64, 1).unwrap_err().is_invalid_config());
        assert!(MultipoolAllocator::new(1, 0, 1).unwrap_err().is_invalid_config());
        assert!(MultipoolAllocator::new(1, 48, 5).unwrap_err().is_invalid_config());
        assert!(MultipoolAllocator::new(1, 64, 64).unwrap_err().is_invalid_config());
    }

    #[test]
    fn default_depth_has_two_levels() {
        let pool = MultipoolAllocator::with_default_depth(4, 128).unwrap();
        assert_eq!(pool.pool_depth(), DEFAULT_DEPTH);
        assert_eq!(pool.depth_block_size(1), 64);
        assert_eq!(pool.depth_block_count(1), 8);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_panics() {
        let pool = MultipoolAllocator::new(1, 64, 1).unwrap();
        let ptr = pool.allocate(8, 8).unwrap();
        // SAFETY: never dereferenced; the second free is rejected before any
        // state changes.
        unsafe {
            pool.free(ptr);
            pool.free(ptr);
        }
    }

    #[test]
    #[should_panic(expected = "not a block boundary")]
    fn interior_pointer_panics() {
        let pool = MultipoolAllocator::new(1, 64, 1).unwrap();
        let ptr = pool.allocate(64, 8).unwrap();
        // SAFETY: stays inside the allocated block; the free is rejected
        // before any state changes.
        unsafe { pool.free(ptr.add(8)) };
    }
}
