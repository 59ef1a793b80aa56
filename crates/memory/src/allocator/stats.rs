//! Allocator statistics tracking
//!
//! Every allocator keeps the same base record: fixed capacity, bytes in use
//! and the number of live allocations. Those three are always maintained.
//! The extended counters (peak, totals, failures) are only updated when
//! [`AllocatorConfig::track_stats`](crate::config::AllocatorConfig) is set.

use core::cell::Cell;
use core::fmt;

/// Snapshot of an allocator's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Fixed byte capacity of the arena
    pub max_size: usize,
    /// Bytes currently handed out, padding and headers included
    pub memory_usage: usize,
    /// Number of live allocations
    pub allocation_count: usize,
    /// Highest `memory_usage` observed
    pub peak_usage: usize,
    /// Successful allocations since construction or the last statistics reset
    pub total_allocations: usize,
    /// Releases (free, rewind, clear) since construction or the last reset
    pub total_frees: usize,
    /// Requests that returned `None`
    pub failed_allocations: usize,
}

impl AllocatorStats {
    /// Bytes still available
    pub fn available(&self) -> usize {
        self.max_size - self.memory_usage
    }

    /// Current usage as a percentage of capacity
    pub fn usage_percent(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.memory_usage as f64 / self.max_size as f64 * 100.0
        }
    }

    /// Ratio of successful requests to all requests (0.0 to 1.0)
    pub fn allocation_efficiency(&self) -> f64 {
        let attempts = self.total_allocations + self.failed_allocations;
        if attempts > 0 {
            self.total_allocations as f64 / attempts as f64
        } else {
            1.0
        }
    }

    /// Check if there are any live allocations
    pub fn has_active_allocations(&self) -> bool {
        self.allocation_count > 0
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Allocator Statistics:")?;
        writeln!(
            f,
            "  Usage: {} / {} bytes ({:.1}%)",
            self.memory_usage,
            self.max_size,
            self.usage_percent()
        )?;
        writeln!(f, "  Live allocations: {}", self.allocation_count)?;
        writeln!(f, "  Peak usage: {} bytes", self.peak_usage)?;
        writeln!(f, "  Allocations: {}", self.total_allocations)?;
        writeln!(f, "  Frees: {}", self.total_frees)?;
        write!(f, "  Failed allocations: {}", self.failed_allocations)
    }
}

/// Live counters owned by an allocator
///
/// `Cell` based: allocators are single-owner and `!Sync`.
#[derive(Debug)]
pub(crate) struct Counters {
    total_size: usize,
    used: Cell<usize>,
    count: Cell<usize>,

    track: bool,
    peak: Cell<usize>,
    total_allocations: Cell<usize>,
    total_frees: Cell<usize>,
    failed: Cell<usize>,
}

impl Counters {
    pub(crate) fn new(total_size: usize, track: bool) -> Self {
        Self {
            total_size,
            used: Cell::new(0),
            count: Cell::new(0),
            track,
            peak: Cell::new(0),
            total_allocations: Cell::new(0),
            total_frees: Cell::new(0),
            failed: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn total_size(&self) -> usize {
        self.total_size
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.used.get()
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count.get()
    }

    #[inline]
    pub(crate) fn is_tracking(&self) -> bool {
        self.track
    }

    #[inline]
    pub(crate) fn record_alloc(&self, bytes: usize) {
        let used = self.used.get() + bytes;
        debug_assert!(used <= self.total_size);
        self.used.set(used);
        self.count.set(self.count.get() + 1);

        if self.track {
            self.total_allocations.set(self.total_allocations.get() + 1);
            if used > self.peak.get() {
                self.peak.set(used);
            }
        }
    }

    #[inline]
    pub(crate) fn record_free(&self, bytes: usize) {
        debug_assert!(bytes <= self.used.get() && self.count.get() > 0);
        self.used.set(self.used.get() - bytes);
        self.count.set(self.count.get() - 1);

        if self.track {
            self.total_frees.set(self.total_frees.get() + 1);
        }
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        if self.track {
            self.failed.set(self.failed.get() + 1);
        }
    }

    /// Grows or shrinks the usage of a live allocation
    #[inline]
    pub(crate) fn record_resize(&self, old_bytes: usize, new_bytes: usize) {
        let used = self.used.get() - old_bytes + new_bytes;
        debug_assert!(used <= self.total_size);
        self.used.set(used);

        if self.track && used > self.peak.get() {
            self.peak.set(used);
        }
    }

    /// Rolls the base record back to an earlier state, counting the
    /// difference in allocations as frees
    pub(crate) fn restore(&self, used: usize, count: usize) {
        debug_assert!(count <= self.count.get());
        if self.track {
            let released = self.count.get() - count;
            self.total_frees.set(self.total_frees.get() + released);
        }
        self.used.set(used);
        self.count.set(count);
    }

    /// Zeroes the base record; extended statistics survive
    pub(crate) fn clear(&self) {
        self.restore(0, 0);
    }

    /// Zeroes the extended statistics
    pub(crate) fn reset_extended(&self) {
        self.peak.set(self.used.get());
        self.total_allocations.set(0);
        self.total_frees.set(0);
        self.failed.set(0);
    }

    pub(crate) fn snapshot(&self) -> AllocatorStats {
        AllocatorStats {
            max_size: self.total_size,
            memory_usage: self.used.get(),
            allocation_count: self.count.get(),
            peak_usage: self.peak.get(),
            total_allocations: self.total_allocations.get(),
            total_frees: self.total_frees.get(),
            failed_allocations: self.failed.get(),
        }
    }
}
