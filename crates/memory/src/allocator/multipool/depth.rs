//! Depth levels of a multipool
//!
//! Depth `d` holds `block_count << d` blocks of `block_size >> d` bytes, so
//! every level spans the same number of bytes.

/// Snapshot of one depth level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthInfo {
    /// Depth index, `0` is the level with the largest blocks
    pub depth: usize,
    /// Bytes per block at this depth
    pub block_size: usize,
    /// Blocks at this depth
    pub block_count: usize,
    /// Blocks currently on this depth's free list
    pub free_blocks: usize,
}

/// Picks the depth serving a request of `size` bytes
///
/// Returns the deepest level whose blocks still hold `size` bytes, i.e. the
/// smallest sufficient block, or `None` when even depth 0 is too small.
/// `block_size` must be divisible by `2^pool_depth`.
#[inline]
pub(crate) fn select_depth(block_size: usize, pool_depth: usize, size: usize) -> Option<usize> {
    debug_assert!(size > 0);
    if size > block_size {
        return None;
    }

    // (block_size >> d) >= size  <=>  block_size / size >= 2^d
    let fitting = (block_size / size).ilog2() as usize;
    Some(fitting.min(pool_depth))
}
