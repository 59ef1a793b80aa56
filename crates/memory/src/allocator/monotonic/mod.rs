//! Monotonic (bump) allocator
//!
//! Allocation advances a cursor through one arena. There is no per-object
//! free: memory comes back in bulk through [`Resettable::clear`] or by
//! rewinding to a [`Checkpoint`].
//!
//! ```text
//! [alloc][pad|alloc][alloc][........free........]
//!                          ↑ position
//! ```

mod checkpoint;

use core::cell::Cell;
use core::mem::{align_of, size_of, size_of_val};
use core::ptr::{self, NonNull};

pub use checkpoint::Checkpoint;
use checkpoint::RewindLog;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use super::arena::Arena;
use super::stats::Counters;
use super::traits::{check_request, is_valid_request};
use super::{Allocator, AllocatorStats, MemoryUsage, Resettable, StatisticsProvider};
use crate::config::AllocatorConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::forward_padding;

/// Bump allocator over a fixed-size arena
///
/// `memory_usage` counts alignment padding, so it always equals the cursor
/// position.
///
/// # Examples
/// ```
/// use strata_memory::allocator::{Allocator, MemoryUsage, MonotonicAllocator, Resettable};
///
/// let mut arena = MonotonicAllocator::new(64).unwrap();
/// let a = arena.allocate(3, 1).unwrap();
/// let b = arena.allocate(8, 8).unwrap();
/// assert_eq!(b.as_ptr() as usize % 8, 0);
/// assert!(arena.memory_usage() >= 11);
///
/// arena.clear();
/// assert_eq!(arena.memory_usage(), 0);
/// # let _ = a;
/// ```
#[derive(Debug)]
pub struct MonotonicAllocator {
    arena: Arena,
    position: Cell<usize>,
    counters: Counters,
    config: AllocatorConfig,
    generation: u64,
    next_checkpoint: Cell<u64>,
    rewinds: RewindLog,
}

impl MonotonicAllocator {
    /// Creates a monotonic allocator over `size` bytes with default
    /// configuration
    pub fn new(size: usize) -> MemoryResult<Self> {
        Self::with_config(size, AllocatorConfig::default())
    }

    /// Creates a monotonic allocator over `size` bytes
    pub fn with_config(size: usize, config: AllocatorConfig) -> MemoryResult<Self> {
        if size == 0 {
            return Err(MemoryError::invalid_config("arena size must be non-zero"));
        }

        let arena = Arena::new(size, 1)?;

        #[cfg(feature = "logging")]
        debug!(size, track_stats = config.track_stats, "monotonic allocator created");

        Ok(Self {
            arena,
            position: Cell::new(0),
            counters: Counters::new(size, config.track_stats),
            config,
            generation: 0,
            next_checkpoint: Cell::new(0),
            rewinds: RewindLog::default(),
        })
    }

    /// Cursor offset from the start of the arena
    #[inline]
    pub fn position(&self) -> usize {
        self.position.get()
    }

    /// Active configuration
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Returns `(data offset, bytes consumed)` for a request, or `None` when
    /// it does not fit
    #[inline]
    fn fit(&self, size: usize, alignment: usize) -> Option<(usize, usize)> {
        let position = self.position.get();
        let padding = forward_padding(self.arena.base_addr() + position, alignment);
        let needed = padding.checked_add(size)?;

        (needed <= self.arena.len() - position).then_some((position + padding, needed))
    }

    /// Moves `value` into the arena and returns a mutable reference to it
    ///
    /// The value is never dropped: bump memory is reclaimed in bulk without
    /// running destructors.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> Option<&mut T> {
        let ptr = self.allocate(size_of::<T>().max(1), align_of::<T>())?.cast::<T>();
        // SAFETY: the block is fresh, exclusively ours, sized and aligned for
        // T. The returned borrow is tied to &self, and clear/rewind need
        // &mut self, so the memory outlives the reference.
        unsafe {
            ptr.as_ptr().write(value);
            Some(&mut *ptr.as_ptr())
        }
    }

    /// Copies `src` into the arena
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Option<&mut [T]> {
        if src.is_empty() {
            return Some(&mut []);
        }

        let ptr = self.allocate(size_of_val(src), align_of::<T>())?.cast::<T>();
        // SAFETY: the block holds src.len() properly aligned T slots and does
        // not overlap src, which lives outside the fresh block.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            Some(core::slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
        }
    }

    /// Saves the current cursor position
    pub fn checkpoint(&self) -> Checkpoint {
        let id = self.next_checkpoint.get();
        self.next_checkpoint.set(id.wrapping_add(1));

        Checkpoint {
            position: self.position.get(),
            count: self.counters.count(),
            generation: self.generation,
            id,
        }
    }

    /// Releases every allocation made after `checkpoint`
    ///
    /// Fails when `checkpoint` predates a `clear`, or was taken after a
    /// checkpoint that has since been rewound to.
    pub fn rewind(&mut self, checkpoint: Checkpoint) -> MemoryResult<()> {
        if checkpoint.generation != self.generation {
            return Err(MemoryError::stale_marker("checkpoint"));
        }

        if self.rewinds.covers(checkpoint.id) {
            return Err(MemoryError::invalid_state(
                "checkpoint was released by an earlier rewind",
            ));
        }

        let current = self.position.get();
        if checkpoint.position > current || checkpoint.count > self.counters.count() {
            return Err(MemoryError::invalid_state(
                "checkpoint is ahead of the current position",
            ));
        }

        if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(checkpoint.position, current - checkpoint.position, byte);
        }

        self.position.set(checkpoint.position);
        self.counters.restore(checkpoint.position, checkpoint.count);
        self.rewinds.record(checkpoint.id, self.next_checkpoint.get());

        #[cfg(feature = "logging")]
        debug!(
            from = current,
            to = checkpoint.position,
            "monotonic allocator rewound"
        );

        Ok(())
    }
}

impl Allocator for MonotonicAllocator {
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        check_request("monotonic", size, alignment);

        let Some((offset, needed)) = self.fit(size, alignment) else {
            #[cfg(feature = "logging")]
            trace!(
                size,
                alignment,
                position = self.position.get(),
                "monotonic allocator exhausted"
            );
            self.counters.record_failure();
            return None;
        };

        self.position.set(self.position.get() + needed);
        self.counters.record_alloc(needed);

        if let Some(byte) = self.config.alloc_pattern {
            self.arena.fill(offset, size, byte);
        }

        Some(self.arena.ptr_at(offset))
    }

    fn can_allocate(&self, size: usize, alignment: usize) -> bool {
        is_valid_request(size, alignment) && self.fit(size, alignment).is_some()
    }
}

impl Resettable for MonotonicAllocator {
    fn clear(&mut self) {
        let released = self.position.get();

        if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(0, released, byte);
        }

        self.position.set(0);
        self.counters.clear();
        self.generation = self.generation.wrapping_add(1);
        self.next_checkpoint.set(0);
        self.rewinds.clear();

        #[cfg(feature = "logging")]
        debug!(released, "monotonic allocator cleared");
    }
}

impl MemoryUsage for MonotonicAllocator {
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

impl StatisticsProvider for MonotonicAllocator {
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
