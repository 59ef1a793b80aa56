//! Bump cursor checkpoints

/// Saved position of a [`MonotonicAllocator`](super::MonotonicAllocator)
///
/// Rewinding to a checkpoint releases every allocation made after it. A
/// checkpoint taken before a `clear` is stale and rejected, and so is one
/// taken after a checkpoint that has since been rewound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub(super) position: usize,
    pub(super) count: usize,
    pub(super) generation: u64,
    pub(super) id: u64,
}

impl Checkpoint {
    /// Cursor offset at the time the checkpoint was taken
    pub fn position(&self) -> usize {
        self.position
    }

    /// Live allocations at the time the checkpoint was taken
    pub fn allocation_count(&self) -> usize {
        self.count
    }
}

const LOG_CAPACITY: usize = 8;

/// Ranges of checkpoint ids invalidated by rewinds
///
/// Rewinding to checkpoint `c` while the next id to hand out is `n`
/// invalidates every id in `c + 1..n`. Spans are kept with strictly
/// increasing starts. When the log is full the two oldest spans are merged,
/// which may reject a checkpoint that was still usable but never accepts an
/// invalid one.
#[derive(Debug, Default)]
pub(super) struct RewindLog {
    spans: [(u64, u64); LOG_CAPACITY],
    len: usize,
}

impl RewindLog {
    pub(super) fn covers(&self, id: u64) -> bool {
        self.spans[..self.len]
            .iter()
            .any(|&(from, until)| from < id && id < until)
    }

    pub(super) fn record(&mut self, from: u64, until: u64) {
        // Later spans starting at or after `from` are contained in the new one.
        while self.len > 0 && self.spans[self.len - 1].0 >= from {
            self.len -= 1;
        }

        if self.len == LOG_CAPACITY {
            self.spans[0].1 = self.spans[1].1;
            self.spans.copy_within(2.., 1);
            self.len -= 1;
        }

        self.spans[self.len] = (from, until);
        self.len += 1;
    }

    pub(super) fn clear(&mut self) {
        self.len = 0;
    }
}
