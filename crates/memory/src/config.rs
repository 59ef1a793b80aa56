//! Allocator configuration
//!
//! One configuration type is shared by all four allocators. It only controls
//! diagnostics: capacity and geometry are constructor arguments.

/// Configuration shared by every allocator in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Enable statistics tracking (peak usage, totals, failed requests)
    pub track_stats: bool,

    /// Fill patterns for debugging
    ///
    /// Written over the user bytes of a block on allocate and free. Headers
    /// and free-list links are never overwritten.
    pub alloc_pattern: Option<u8>,
    pub dealloc_pattern: Option<u8>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl AllocatorConfig {
    /// Production configuration - statistics on, no fill patterns
    pub fn production() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - minimal overhead
    pub fn performance() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Returns a copy with statistics tracking toggled
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Returns a copy with the given fill patterns
    pub fn with_patterns(mut self, alloc: Option<u8>, dealloc: Option<u8>) -> Self {
        self.alloc_pattern = alloc;
        self.dealloc_pattern = dealloc;
        self
    }
}
