//! Allocator traits
//!
//! The contract consumed by containers is split along what each allocator
//! can actually do:
//! - [`Allocator`]: hand out memory (all four allocators)
//! - [`Deallocator`]: release one allocation (stack, pool, multipool)
//! - [`BlockAllocator`]: per-allocation capacity and in-place resizing
//! - [`Resettable`]: release everything at once
//! - [`MemoryUsage`]: the read-only usage counters
//! - [`StatisticsProvider`]: extended statistics snapshot
//!
//! # Caller contract
//!
//! Pointers returned by `allocate` stay valid until they are freed, the
//! allocator is cleared or rewound past them, or the allocator is dropped.
//! Dereferencing them is `unsafe` and the caller's responsibility. Releasing
//! a single allocation is `unsafe` too, because the allocator cannot see
//! whether a reference into the block is still alive; [`ArenaBox`] is the
//! safe way to own one. No allocator operation touches memory outside its
//! arena.
//!
//! [`ArenaBox`]: super::ArenaBox

use core::ptr::NonNull;

use super::AllocatorStats;

/// Hands out memory from a fixed-capacity arena
pub trait Allocator {
    /// Allocates `size` bytes aligned to `alignment`
    ///
    /// Returns `None` when the request cannot be satisfied right now. This is
    /// a normal condition the caller must check.
    ///
    /// # Panics
    /// If `size` is zero or `alignment` is not a non-zero power of two.
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>>;

    /// Reports whether `allocate(size, alignment)` would succeed, without
    /// changing any state
    ///
    /// Requests that `allocate` would reject with a panic report `false`.
    fn can_allocate(&self, size: usize, alignment: usize) -> bool;
}

/// Allocators that can release a single allocation
pub trait Deallocator: Allocator {
    /// Releases memory previously returned by [`Allocator::allocate`]
    ///
    /// # Safety
    /// The caller owns the allocation at `ptr`: no reference into it is alive
    /// and nothing reads or writes through `ptr` afterwards. A block that
    /// backs a live [`ArenaBox`](super::ArenaBox) or `&mut T` must not be
    /// freed this way; dropping the handle releases it.
    ///
    /// # Panics
    /// If `ptr` was not handed out by this allocator, or releasing it would
    /// break the allocator's ordering rules (double free, out-of-order stack
    /// free).
    unsafe fn free(&self, ptr: NonNull<u8>);
}

/// Allocators that know the usable size of each allocation
pub trait BlockAllocator: Deallocator {
    /// Bytes writable at `ptr`, `0` for `None`
    fn allocation_capacity(&self, ptr: Option<NonNull<u8>>) -> usize;

    /// Resizes the allocation at `ptr` to `new_size` bytes
    ///
    /// Returns the (possibly moved) pointer, or `None` with the original
    /// allocation untouched when the resize cannot be done.
    ///
    /// # Safety
    /// Same as [`Deallocator::free`]: the caller owns the allocation and no
    /// reference into it is alive. On `Some`, the old pointer is invalid
    /// unless it equals the returned one.
    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>>;
}

/// Allocators that can release every allocation at once
pub trait Resettable {
    /// Returns the allocator to its freshly constructed state
    ///
    /// Takes `&mut self`: typed handles borrowing the allocator cannot
    /// survive a reset. Raw pointers become dangling.
    fn clear(&mut self);
}

/// Read-only usage counters
pub trait MemoryUsage {
    /// Fixed byte capacity, constant after construction
    fn max_size(&self) -> usize;

    /// Bytes currently handed out, including padding and headers
    fn memory_usage(&self) -> usize;

    /// Number of live allocations
    fn allocation_count(&self) -> usize;

    /// Bytes not currently handed out
    fn available_memory(&self) -> usize {
        self.max_size().saturating_sub(self.memory_usage())
    }

    /// Usage as a percentage of capacity
    fn usage_percent(&self) -> f64 {
        let max = self.max_size();
        if max == 0 {
            0.0
        } else {
            self.memory_usage() as f64 / max as f64 * 100.0
        }
    }
}

/// Allocators that expose an [`AllocatorStats`] snapshot
pub trait StatisticsProvider {
    /// Current statistics
    fn statistics(&self) -> AllocatorStats;

    /// Zeroes the extended counters; the base record is untouched
    fn reset_statistics(&self);

    /// Whether the extended counters are being maintained
    fn statistics_enabled(&self) -> bool {
        true
    }
}

impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size, alignment)
    }

    #[inline]
    fn can_allocate(&self, size: usize, alignment: usize) -> bool {
        (**self).can_allocate(size, alignment)
    }
}

impl<A: Deallocator + ?Sized> Deallocator for &A {
    #[inline]
    unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded from the caller.
        unsafe { (**self).free(ptr) }
    }
}

impl<A: MemoryUsage + ?Sized> MemoryUsage for &A {
    #[inline]
    fn max_size(&self) -> usize {
        (**self).max_size()
    }

    #[inline]
    fn memory_usage(&self) -> usize {
        (**self).memory_usage()
    }

    #[inline]
    fn allocation_count(&self) -> usize {
        (**self).allocation_count()
    }
}

/// Validates the arguments of an allocation request
///
/// Panics on contract violations; shared by every allocator.
#[inline]
#[track_caller]
pub(crate) fn check_request(kind: &'static str, size: usize, alignment: usize) {
    if size == 0 || !alignment.is_power_of_two() {
        #[cfg(feature = "logging")]
        tracing::error!(allocator = kind, size, alignment, "invalid allocation request");

        assert!(size != 0, "{kind}: zero-size allocation");
        panic!("{kind}: alignment {alignment} is not a non-zero power of two");
    }
}

/// Non-panicking form of [`check_request`] used by `can_allocate`
#[inline]
pub(crate) fn is_valid_request(size: usize, alignment: usize) -> bool {
    size != 0 && alignment.is_power_of_two()
}
