//! Position markers for scoped deallocation

/// Saved top of a [`StackAllocator`](super::StackAllocator)
///
/// Obtained from [`StackAllocator::mark`](super::StackAllocator::mark).
/// Passing it to [`StackAllocator::rewind`](super::StackAllocator::rewind)
/// pops everything allocated after it in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMarker {
    pub(super) top: usize,
    pub(super) last: usize,
    pub(super) count: usize,
    pub(super) generation: u64,
}

impl StackMarker {
    /// Stack top at the time the marker was taken
    pub fn position(&self) -> usize {
        self.top
    }

    /// Live allocations at the time the marker was taken
    pub fn allocation_count(&self) -> usize {
        self.count
    }
}
