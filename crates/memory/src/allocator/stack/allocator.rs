//! Main stack allocator implementation
//!
//! # Layout
//!
//! Every allocation is preceded by a [`StackHeader`] written immediately in
//! front of the returned address:
//!
//! ```text
//! prev top                          new top
//!    ↓                                 ↓
//!    [ padding ... | header | data ....]
//!    |<------ adjustment -->|
//! ```
//!
//! `adjustment` is the full distance from the previous top to the data, so
//! `free` restores the top as `data - adjustment`. `previous` links to the
//! data offset of the allocation below, which lets `rewind` walk the live
//! allocations from the top down.
//!
//! ## Invariants
//!
//! - `top` is one past the last live allocation and equals `memory_usage`
//! - `last` is the data offset of the most recent live allocation
//! - Only the allocation at `last` may be freed; anything else panics
//! - Headers stay inside the arena (the padding always reserves room for one)

use core::cell::Cell;
use core::mem::size_of;
use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use super::StackMarker;
use crate::allocator::arena::Arena;
use crate::allocator::stats::Counters;
use crate::allocator::traits::{check_request, is_valid_request};
use crate::allocator::{
    Allocator, AllocatorStats, BlockAllocator, Deallocator, MemoryUsage, Resettable,
    StatisticsProvider, contract_violation,
};
use crate::config::AllocatorConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::forward_padding_with_header;

/// Bookkeeping stored in front of every stack allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct StackHeader {
    /// Bytes from the previous top to the data
    adjustment: usize,
    /// Requested size
    size: usize,
    /// Data offset of the allocation below, [`EMPTY`] for the first one
    previous: usize,
}

/// `last` / `previous` value when there is no allocation
const EMPTY: usize = usize::MAX;

const HEADER_SIZE: usize = size_of::<StackHeader>();

/// LIFO allocator over a fixed-size arena
///
/// Allocations must be freed in reverse order. Freeing anything but the most
/// recent live allocation panics instead of corrupting the stack.
///
/// # Examples
/// ```
/// use strata_memory::allocator::{Allocator, Deallocator, MemoryUsage, StackAllocator};
///
/// let stack = StackAllocator::new(256).unwrap();
/// let a = stack.allocate(16, 8).unwrap();
/// let b = stack.allocate(32, 16).unwrap();
/// assert!(a < b);
///
/// // SAFETY: neither block is referenced; they are released newest first.
/// unsafe {
///     stack.free(b);
///     stack.free(a);
/// }
/// assert_eq!(stack.memory_usage(), 0);
/// ```
#[derive(Debug)]
pub struct StackAllocator {
    arena: Arena,
    top: Cell<usize>,
    last: Cell<usize>,
    counters: Counters,
    config: AllocatorConfig,
    generation: u64,
}

impl StackAllocator {
    /// Creates a stack allocator over `size` bytes with default configuration
    pub fn new(size: usize) -> MemoryResult<Self> {
        Self::with_config(size, AllocatorConfig::default())
    }

    /// Creates a stack allocator over `size` bytes
    pub fn with_config(size: usize, config: AllocatorConfig) -> MemoryResult<Self> {
        if size == 0 {
            return Err(MemoryError::invalid_config("arena size must be non-zero"));
        }

        let arena = Arena::new(size, 1)?;

        #[cfg(feature = "logging")]
        debug!(size, header = HEADER_SIZE, "stack allocator created");

        Ok(Self {
            arena,
            top: Cell::new(0),
            last: Cell::new(EMPTY),
            counters: Counters::new(size, config.track_stats),
            config,
            generation: 0,
        })
    }

    /// Offset one past the last live allocation
    #[inline]
    pub fn top_offset(&self) -> usize {
        self.top.get()
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

    /// Saves the current top
    pub fn mark(&self) -> StackMarker {
        StackMarker {
            top: self.top.get(),
            last: self.last.get(),
            count: self.counters.count(),
            generation: self.generation,
        }
    }

    /// Pops every allocation made after `marker`
    ///
    /// Fails with [`MemoryError::InvalidState`] when the marker was taken
    /// before the last `clear`, or when the allocations below it changed
    /// since: an allocation it covered was freed, possibly with new ones
    /// made in its place.
    pub fn rewind(&mut self, marker: StackMarker) -> MemoryResult<()> {
        if marker.generation != self.generation {
            return Err(MemoryError::stale_marker("stack marker"));
        }

        let current = self.top.get();
        let Some(popped) = self.counters.count().checked_sub(marker.count) else {
            return Err(MemoryError::invalid_state(
                "stack marker is above the current top",
            ));
        };

        let (mut top, mut last) = (current, self.last.get());
        for _ in 0..popped {
            let header: StackHeader = self.arena.read(last - HEADER_SIZE);
            top = last - header.adjustment;
            last = header.previous;
        }
        if top != marker.top || last != marker.last {
            return Err(MemoryError::invalid_state(
                "stack marker does not match the live allocations",
            ));
        }

        if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(top, current - top, byte);
        }

        self.top.set(top);
        self.last.set(last);
        self.counters.restore(top, marker.count);

        #[cfg(feature = "logging")]
        debug!(from = current, to = top, popped, "stack allocator rewound");

        Ok(())
    }

    /// Returns `(data offset, bytes consumed)` for a request at the current
    /// top, or `None` when it does not fit
    #[inline]
    fn fit(&self, size: usize, alignment: usize) -> Option<(usize, usize)> {
        let top = self.top.get();
        let padding =
            forward_padding_with_header(self.arena.base_addr() + top, alignment, HEADER_SIZE);
        let needed = padding.checked_add(size)?;

        (needed <= self.arena.len() - top).then_some((top + padding, needed))
    }

    /// Resolves `ptr` to its data offset and header, panicking when it cannot
    /// be a stack allocation of this arena
    fn locate(&self, ptr: NonNull<u8>) -> (usize, StackHeader) {
        let Some(offset) = self.arena.offset_of(ptr) else {
            contract_violation(
                "stack",
                format_args!("pointer {ptr:p} does not belong to this allocator"),
            );
        };
        if offset < HEADER_SIZE {
            contract_violation(
                "stack",
                format_args!("pointer {ptr:p} is not a stack allocation"),
            );
        }

        (offset, self.arena.read(offset - HEADER_SIZE))
    }

    /// Whether the allocation at `offset` is the most recent live one
    #[inline]
    fn is_top(&self, offset: usize) -> bool {
        offset == self.last.get()
    }
}

impl Allocator for StackAllocator {
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        check_request("stack", size, alignment);

        let Some((offset, needed)) = self.fit(size, alignment) else {
            #[cfg(feature = "logging")]
            trace!(size, alignment, top = self.top.get(), "stack allocator exhausted");
            self.counters.record_failure();
            return None;
        };

        self.arena.write(
            offset - HEADER_SIZE,
            StackHeader {
                adjustment: offset - self.top.get(),
                size,
                previous: self.last.get(),
            },
        );
        self.top.set(offset + size);
        self.last.set(offset);
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

impl Deallocator for StackAllocator {
    unsafe fn free(&self, ptr: NonNull<u8>) {
        let (offset, header) = self.locate(ptr);

        if !self.is_top(offset) {
            contract_violation(
                "stack",
                format_args!(
                    "free of {ptr:p} out of LIFO order (top is {})",
                    self.top.get()
                ),
            );
        }

        if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(offset, header.size, byte);
        }

        self.top.set(offset - header.adjustment);
        self.last.set(header.previous);
        self.counters.record_free(header.adjustment + header.size);
    }
}

impl BlockAllocator for StackAllocator {
    fn allocation_capacity(&self, ptr: Option<NonNull<u8>>) -> usize {
        ptr.map_or(0, |ptr| self.locate(ptr).1.size)
    }

    /// Resizes the most recent allocation in place
    ///
    /// Any other allocation cannot move without breaking LIFO order, so the
    /// call returns `None` for it.
    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        check_request("stack", new_size, 1);

        let (offset, header) = self.locate(ptr);
        if !self.is_top(offset) {
            return None;
        }

        if new_size > self.arena.len() - offset {
            #[cfg(feature = "logging")]
            trace!(new_size, top = self.top.get(), "stack allocator cannot grow in place");
            self.counters.record_failure();
            return None;
        }

        let old_size = header.size;
        if new_size > old_size {
            if let Some(byte) = self.config.alloc_pattern {
                self.arena.fill(offset + old_size, new_size - old_size, byte);
            }
        } else if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(offset + new_size, old_size - new_size, byte);
        }

        self.arena.write(
            offset - HEADER_SIZE,
            StackHeader {
                size: new_size,
                ..header
            },
        );
        self.top.set(offset + new_size);
        self.counters.record_resize(old_size, new_size);

        Some(ptr)
    }
}

impl Resettable for StackAllocator {
    fn clear(&mut self) {
        let released = self.top.get();

        if let Some(byte) = self.config.dealloc_pattern {
            self.arena.fill(0, released, byte);
        }

        self.top.set(0);
        self.last.set(EMPTY);
        self.counters.clear();
        self.generation = self.generation.wrapping_add(1);

        #[cfg(feature = "logging")]
        debug!(released, "stack allocator cleared");
    }
}

impl MemoryUsage for StackAllocator {
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

impl StatisticsProvider for StackAllocator {
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
