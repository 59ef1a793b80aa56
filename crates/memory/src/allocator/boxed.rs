//! Smart pointer for arena-allocated objects

use core::fmt;
use core::marker::PhantomData;
use core::mem::{ManuallyDrop, align_of, size_of};
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use super::Deallocator;
use crate::error::{MemoryResult, OptionExt};

/// RAII smart pointer for a value placed in allocator memory
///
/// Drops the value and returns its memory to the allocator when dropped.
/// Similar to `Box` but backed by any [`Deallocator`].
///
/// On a [`StackAllocator`](super::StackAllocator) boxes must be dropped in
/// reverse creation order; locals declared in order get that for free.
///
/// # Examples
/// ```
/// use strata_memory::allocator::{ArenaBox, MemoryUsage, PoolAllocator};
///
/// let pool = PoolAllocator::new(4, 64).unwrap();
/// {
///     let mut point = ArenaBox::new_in((1.0f32, 2.0f32), &pool).unwrap();
///     point.0 += 1.0;
///     assert_eq!(*point, (2.0, 2.0));
///     assert_eq!(pool.allocation_count(), 1);
/// }
/// assert_eq!(pool.allocation_count(), 0);
/// ```
///
/// Releasing the block behind a live box takes `unsafe`:
/// ```compile_fail,E0133
/// use strata_memory::allocator::{ArenaBox, Deallocator, PoolAllocator};
///
/// let pool = PoolAllocator::new(2, 16).unwrap();
/// let boxed = ArenaBox::new_in([1u64, 2], &pool).unwrap();
/// pool.free(ArenaBox::as_ptr(&boxed).cast());
/// ```
pub struct ArenaBox<'a, T, A: Deallocator + ?Sized> {
    ptr: NonNull<T>,
    allocator: &'a A,
    _owns: PhantomData<T>,
}

impl<'a, T, A: Deallocator + ?Sized> ArenaBox<'a, T, A> {
    /// Moves `value` into memory obtained from `allocator`
    ///
    /// Returns `None` (dropping `value`) when the allocator cannot serve
    /// `size_of::<T>()` bytes at `align_of::<T>()`.
    #[must_use = "allocated value must be used"]
    pub fn new_in(value: T, allocator: &'a A) -> Option<Self> {
        let ptr = allocator
            .allocate(size_of::<T>().max(1), align_of::<T>())?
            .cast::<T>();

        // SAFETY: the allocation is fresh, exclusive, large enough and
        // aligned for T; write does not drop the uninitialized destination.
        unsafe { ptr.as_ptr().write(value) };

        Some(Self {
            ptr,
            allocator,
            _owns: PhantomData,
        })
    }

    /// Like [`ArenaBox::new_in`], reporting failure as
    /// [`MemoryError::AllocationFailed`](crate::error::MemoryError)
    pub fn try_new_in(value: T, allocator: &'a A) -> MemoryResult<Self> {
        let (size, align) = (size_of::<T>().max(1), align_of::<T>());
        let ptr = allocator.allocate(size, align).or_alloc_error(size, align)?.cast::<T>();

        // SAFETY: as in new_in.
        unsafe { ptr.as_ptr().write(value) };

        Ok(Self {
            ptr,
            allocator,
            _owns: PhantomData,
        })
    }

    /// Consumes the box and returns the contained value, freeing its memory
    #[must_use]
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        // SAFETY: ptr holds an initialized T that is read exactly once; the
        // ManuallyDrop wrapper keeps Drop from touching it again.
        let value = unsafe { ptr::read(this.ptr.as_ptr()) };
        // SAFETY: the box owned the block and the value has been moved out.
        unsafe { this.allocator.free(this.ptr.cast()) };
        value
    }

    /// Raw pointer to the contained value
    pub fn as_ptr(this: &Self) -> NonNull<T> {
        this.ptr
    }

    /// Allocator that owns the memory
    pub fn allocator(this: &Self) -> &'a A {
        this.allocator
    }
}

impl<T, A: Deallocator + ?Sized> Deref for ArenaBox<'_, T, A> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ptr points to an initialized T owned by this box for as
        // long as the box lives.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T, A: Deallocator + ?Sized> DerefMut for ArenaBox<'_, T, A> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in deref; &mut self guarantees exclusive access.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T, A: Deallocator + ?Sized> Drop for ArenaBox<'_, T, A> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized and dropped exactly once here.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
        // SAFETY: the box is the only owner of the block and is going away.
        unsafe { self.allocator.free(self.ptr.cast()) };
    }
}

impl<T: fmt::Debug, A: Deallocator + ?Sized> fmt::Debug for ArenaBox<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display, A: Deallocator + ?Sized> fmt::Display for ArenaBox<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{MemoryUsage, MultipoolAllocator, PoolAllocator, StackAllocator};
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn drop_runs_destructor_and_frees() {
        let pool = PoolAllocator::new(2, 32).unwrap();
        let drops = Rc::new(Cell::new(0));
        {
            let _boxed = ArenaBox::new_in(DropCounter(Rc::clone(&drops)), &pool).unwrap();
            assert_eq!(pool.allocation_count(), 1);
        }
        assert_eq!(drops.get(), 1);
        assert_eq!(pool.allocation_count(), 0);
    }

    #[test]
    fn into_inner_moves_value_out() {
        let pool = PoolAllocator::new(1, 64).unwrap();
        let boxed = ArenaBox::new_in(String::from("arena"), &pool).unwrap();
        let value = boxed.into_inner();
        assert_eq!(value, "arena");
        assert_eq!(pool.allocation_count(), 0);
    }

    #[test]
    fn stack_boxes_release_in_reverse_order() {
        let stack = StackAllocator::new(256).unwrap();
        {
            let a = ArenaBox::new_in(1u64, &stack).unwrap();
            let b = ArenaBox::new_in([7u32; 4], &stack).unwrap();
            assert_eq!(*a + u64::from(b[0]), 8);
        }
        assert_eq!(stack.memory_usage(), 0);
    }

    #[test]
    fn full_allocator_yields_none() {
        let pool = PoolAllocator::new(1, 16).unwrap();
        let _first = ArenaBox::new_in(1u8, &pool).unwrap();
        assert!(ArenaBox::new_in(2u8, &pool).is_none());
        let err = ArenaBox::try_new_in(3u8, &pool).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn oversized_type_is_rejected_by_pool() {
        let multipool = MultipoolAllocator::new(1, 32, 1).unwrap();
        assert!(ArenaBox::new_in([0u8; 33], &multipool).is_none());
        let fits = ArenaBox::new_in([1u8; 16], &multipool).unwrap();
        assert_eq!(fits.len(), 16);
    }

    #[test]
    fn zero_sized_values() {
        let pool = PoolAllocator::new(1, 16).unwrap();
        let unit = ArenaBox::new_in((), &pool).unwrap();
        assert_eq!(format!("{unit:?}"), "()");
    }
}
