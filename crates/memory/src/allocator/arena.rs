//! Owned backing storage for an allocator
//!
//! # Safety
//!
//! - The buffer is a `Box<[u8]>` reinterpreted as `Box<UnsafeCell<[u8]>>`
//!   so that `&self` operations can write headers and hand out pointers
//! - No reference to the whole buffer is ever created after construction;
//!   every access goes through raw pointers derived from `UnsafeCell::get`
//! - Every accessor bounds-checks its offset range against `len`, so the
//!   allocators built on top cannot read or write outside the buffer

use core::cell::UnsafeCell;
use core::mem::size_of;
use core::ptr::{self, NonNull};

use crate::error::{MemoryError, MemoryResult};
use crate::utils::forward_padding;

/// One contiguous, exclusively owned byte buffer
///
/// The usable region starts at the first address of the buffer aligned to
/// the `base_align` requested at construction and spans exactly `len` bytes.
pub(crate) struct Arena {
    memory: Box<UnsafeCell<[u8]>>,
    /// Offset of the usable region inside `memory`
    start: usize,
    /// Usable bytes
    len: usize,
}

impl Arena {
    /// Allocates an arena of `len` usable bytes whose first byte is aligned
    /// to `base_align`
    ///
    /// The buffer is over-allocated by `base_align - 1` bytes to make room
    /// for the alignment shift.
    pub(crate) fn new(len: usize, base_align: usize) -> MemoryResult<Self> {
        debug_assert!(len > 0);
        debug_assert!(base_align.is_power_of_two());

        let capacity = len
            .checked_add(base_align - 1)
            .filter(|&capacity| capacity <= isize::MAX as usize)
            .ok_or_else(|| MemoryError::size_overflow("arena capacity"))?;

        let boxed_slice = vec![0u8; capacity].into_boxed_slice();
        let raw = Box::into_raw(boxed_slice);
        // SAFETY: UnsafeCell<[u8]> is repr(transparent) over [u8], so the
        // slice pointer keeps its layout and metadata. Ownership moves from
        // into_raw to from_raw exactly once.
        let memory: Box<UnsafeCell<[u8]>> = unsafe { Box::from_raw(raw as *mut UnsafeCell<[u8]>) };

        let buffer_addr = memory.get().cast::<u8>() as usize;
        let start = forward_padding(buffer_addr, base_align);

        Ok(Self { memory, start, len })
    }

    /// Usable bytes
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Address of the first usable byte
    #[inline]
    pub(crate) fn base_addr(&self) -> usize {
        self.base_ptr() as usize
    }

    #[inline]
    fn base_ptr(&self) -> *mut u8 {
        // SAFETY: start < capacity, computed at construction as the
        // alignment shift inside the over-allocated buffer.
        unsafe { self.memory.get().cast::<u8>().add(self.start) }
    }

    /// Pointer to `offset` bytes into the usable region
    ///
    /// `offset == len` is allowed and yields the one-past-the-end pointer.
    #[inline]
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.len, "arena offset {offset} out of bounds");
        // SAFETY: offset is within the usable region (or one past it) and
        // the base pointer comes from a live allocation, so it is non-null.
        unsafe { NonNull::new_unchecked(self.base_ptr().add(offset)) }
    }

    /// Offset of `ptr` inside the usable region, `None` when it points
    /// elsewhere
    #[inline]
    pub(crate) fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let offset = (ptr.as_ptr() as usize).checked_sub(self.base_addr())?;
        (offset < self.len).then_some(offset)
    }

    #[inline]
    fn check_range(&self, offset: usize, len: usize) {
        let in_bounds = offset.checked_add(len).is_some_and(|end| end <= self.len);
        assert!(
            in_bounds,
            "arena range {offset}..+{len} exceeds {} bytes",
            self.len
        );
    }

    /// Reads a `T` stored at `offset` without alignment requirements
    #[inline]
    pub(crate) fn read<T: Copy>(&self, offset: usize) -> T {
        self.check_range(offset, size_of::<T>());
        // SAFETY: the range is inside the buffer (checked above), every bit
        // pattern written by this crate is a valid T (plain integers), and
        // read_unaligned has no alignment requirement.
        unsafe { ptr::read_unaligned(self.base_ptr().add(offset).cast::<T>()) }
    }

    /// Writes a `T` at `offset` without alignment requirements
    #[inline]
    pub(crate) fn write<T: Copy>(&self, offset: usize, value: T) {
        self.check_range(offset, size_of::<T>());
        // SAFETY: the range is inside the buffer (checked above); writes go
        // through the UnsafeCell pointer.
        unsafe { ptr::write_unaligned(self.base_ptr().add(offset).cast::<T>(), value) }
    }

    /// Fills `len` bytes starting at `offset` with `byte`
    #[inline]
    pub(crate) fn fill(&self, offset: usize, len: usize, byte: u8) {
        self.check_range(offset, len);
        // SAFETY: the range is inside the buffer (checked above).
        unsafe { ptr::write_bytes(self.base_ptr().add(offset), byte, len) }
    }

    /// Copies `len` bytes from `src` to `dst`; the ranges may overlap
    #[inline]
    pub(crate) fn copy_within(&self, src: usize, dst: usize, len: usize) {
        self.check_range(src, len);
        self.check_range(dst, len);
        let base = self.base_ptr();
        // SAFETY: both ranges are inside the buffer (checked above);
        // ptr::copy handles overlap.
        unsafe { ptr::copy(base.add(src), base.add(dst), len) }
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("{:#x}", self.base_addr()))
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_aligned;

    #[test]
    fn base_is_aligned() {
        for align in [1, 2, 8, 16, 64, 4096] {
            let arena = Arena::new(100, align).unwrap();
            assert!(is_aligned(arena.base_addr(), align));
            assert_eq!(arena.len(), 100);
        }
    }

    #[test]
    fn offset_round_trip() {
        let arena = Arena::new(64, 16).unwrap();
        let ptr = arena.ptr_at(40);
        assert_eq!(arena.offset_of(ptr), Some(40));
        assert_eq!(arena.offset_of(arena.ptr_at(64)), None);
        assert_eq!(arena.offset_of(NonNull::dangling()), None);
    }

    #[test]
    fn unaligned_header_access() {
        let arena = Arena::new(32, 1).unwrap();
        arena.write::<(usize, usize)>(3, (7, 9));
        assert_eq!(arena.read::<(usize, usize)>(3), (7, 9));
    }

    #[test]
    fn fill_and_copy() {
        let arena = Arena::new(16, 8).unwrap();
        arena.fill(0, 4, 0xAB);
        arena.copy_within(0, 8, 4);
        assert_eq!(arena.read::<[u8; 4]>(8), [0xAB; 4]);
        assert_eq!(arena.read::<u8>(4), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn out_of_bounds_write_panics() {
        let arena = Arena::new(8, 1).unwrap();
        arena.write::<u64>(4, 1);
    }

    #[test]
    fn oversized_arena_is_rejected() {
        let err = Arena::new(usize::MAX, 16).unwrap_err();
        assert_eq!(err.code(), "MEM:ALLOC:OVERFLOW");
    }
}
