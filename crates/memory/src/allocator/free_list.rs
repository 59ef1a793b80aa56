//! Index-based intrusive free list over a run of equally sized blocks
//!
//! A run starts at `region` (an arena offset) and holds `count` blocks laid
//! out back to back, each `stride` bytes:
//!
//! ```text
//! region
//!   ↓
//!   [header | data][header | data][header | data] ...
//!    ↑ BlockHeader  ↑ BLOCK_ALIGN aligned
//! ```
//!
//! A free block's header stores the index of the next free block. An
//! allocated block's header stores [`LIVE`], which is how double frees are
//! caught. The list head is an index, never a pointer.

use core::cell::Cell;
use core::mem::size_of;

use super::arena::Arena;
use crate::utils::align_up;

/// Alignment of every block handed out by the pool and multipool allocators
pub const BLOCK_ALIGN: usize = 16;

/// Metadata stored in the first bytes of each block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub(crate) struct BlockHeader {
    /// Next free block index, [`NONE`] at the tail or [`LIVE`] when allocated
    pub(crate) next: usize,
    /// Depth level that owns the block
    pub(crate) depth: usize,
}

/// Bytes reserved in front of each block's data
pub(crate) const HEADER_SPAN: usize = align_up(size_of::<BlockHeader>(), BLOCK_ALIGN);

/// End of list
pub(crate) const NONE: usize = usize::MAX;
/// Tag of an allocated block
pub(crate) const LIVE: usize = usize::MAX - 1;

/// Outcome of resolving a pointer offset against a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockLookup {
    /// Offset is outside the run
    Outside,
    /// Offset is inside the run but not at the start of a block's data
    Misaligned,
    /// Index of the block whose data starts at the offset
    Block(usize),
}

#[derive(Debug)]
pub(crate) struct FreeList {
    region: usize,
    stride: usize,
    block_size: usize,
    count: usize,
    depth: usize,
    head: Cell<usize>,
    free: Cell<usize>,
}

impl FreeList {
    /// Stride of one block with `block_size` data bytes
    #[inline]
    pub(crate) fn stride_for(block_size: usize) -> Option<usize> {
        block_size
            .checked_add(BLOCK_ALIGN - 1)
            .map(|size| size & !(BLOCK_ALIGN - 1))
            .and_then(|data| data.checked_add(HEADER_SPAN))
    }

    /// Bytes spanned by `count` blocks of `block_size`, `None` on overflow
    #[inline]
    pub(crate) fn span_for(block_size: usize, count: usize) -> Option<usize> {
        Self::stride_for(block_size)?.checked_mul(count)
    }

    /// Describes a run; the headers are written by [`FreeList::link`]
    ///
    /// Callers size the arena with [`FreeList::span_for`] first, so the
    /// stride computation cannot overflow here.
    pub(crate) fn new(region: usize, block_size: usize, count: usize, depth: usize) -> Self {
        let stride = align_up(block_size, BLOCK_ALIGN) + HEADER_SPAN;
        Self {
            region,
            stride,
            block_size,
            count,
            depth,
            head: Cell::new(NONE),
            free: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub(crate) fn free_count(&self) -> usize {
        self.free.get()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.get() == NONE
    }

    /// Offset one past the last block of the run
    #[inline]
    pub(crate) fn end(&self) -> usize {
        self.region + self.stride * self.count
    }

    #[inline]
    fn header_offset(&self, index: usize) -> usize {
        self.region + index * self.stride
    }

    /// Arena offset of the data of block `index`
    #[inline]
    pub(crate) fn data_offset(&self, index: usize) -> usize {
        self.header_offset(index) + HEADER_SPAN
    }

    /// Threads every block onto the list in ascending address order
    ///
    /// `fill` overwrites each block's data, never its header.
    pub(crate) fn link(&self, arena: &Arena, fill: Option<u8>) {
        for index in 0..self.count {
            let next = if index + 1 < self.count { index + 1 } else { NONE };
            arena.write(
                self.header_offset(index),
                BlockHeader {
                    next,
                    depth: self.depth,
                },
            );
            if let Some(byte) = fill {
                arena.fill(self.data_offset(index), self.block_size, byte);
            }
        }

        self.head.set(if self.count > 0 { 0 } else { NONE });
        self.free.set(self.count);
    }

    /// Unlinks the head block, tags it live and returns its index
    pub(crate) fn pop(&self, arena: &Arena) -> Option<usize> {
        let index = self.head.get();
        if index == NONE {
            return None;
        }

        let header: BlockHeader = arena.read(self.header_offset(index));
        debug_assert!(header.next != LIVE, "free list links a live block");
        self.head.set(header.next);
        self.free.set(self.free.get() - 1);

        arena.write(
            self.header_offset(index),
            BlockHeader {
                next: LIVE,
                depth: self.depth,
            },
        );
        Some(index)
    }

    /// Links block `index` back in as the new head
    ///
    /// The caller must have checked [`FreeList::is_live`].
    pub(crate) fn push(&self, arena: &Arena, index: usize) {
        debug_assert!(index < self.count);
        arena.write(
            self.header_offset(index),
            BlockHeader {
                next: self.head.get(),
                depth: self.depth,
            },
        );
        self.head.set(index);
        self.free.set(self.free.get() + 1);
    }

    /// Header of block `index`
    #[inline]
    pub(crate) fn header(&self, arena: &Arena, index: usize) -> BlockHeader {
        arena.read(self.header_offset(index))
    }

    #[inline]
    pub(crate) fn is_live(&self, arena: &Arena, index: usize) -> bool {
        self.header(arena, index).next == LIVE
    }

    /// Resolves an arena offset to the block whose data starts there
    pub(crate) fn lookup(&self, offset: usize) -> BlockLookup {
        if offset < self.region || offset >= self.end() {
            return BlockLookup::Outside;
        }

        let relative = offset - self.region;
        if relative % self.stride == HEADER_SPAN {
            BlockLookup::Block(relative / self.stride)
        } else {
            BlockLookup::Misaligned
        }
    }
}
