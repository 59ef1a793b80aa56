//! Standalone error types for strata-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! Capacity exhaustion is *not* an error here: `allocate` reports it as
//! `None`. [`MemoryError`] covers construction-time validation, marker
//! misuse and callers that want to lift a failed allocation into a `Result`.

use core::ptr::NonNull;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{debug, error};

// ============================================================================
// Main Error Types
// ============================================================================

/// Memory management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: String },

    // --- Construction Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // --- State Errors ---
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },
}

impl MemoryError {
    /// Check if error is retryable
    ///
    /// Only a failed allocation can succeed later, once memory is returned.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::InvalidState { .. } => "MEM:SYSTEM:STATE",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        debug!(size, align, "allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &str) -> Self {
        #[cfg(feature = "logging")]
        error!(operation, "arena size overflow");

        Self::SizeOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        #[cfg(feature = "logging")]
        error!(reason, "invalid allocator configuration");

        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create invalid state error
    pub fn invalid_state(reason: &str) -> Self {
        Self::InvalidState {
            reason: reason.to_string(),
        }
    }

    /// Create stale marker error
    pub fn stale_marker(kind: &str) -> Self {
        Self::invalid_state(&format!("{kind} taken before the last clear"))
    }

    /// Check if this is an invalid configuration error
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

/// Generic result type alias
pub type Result<T> = MemoryResult<T>;

/// Lifts the `None` of a failed allocation into a [`MemoryError`].
///
/// ```
/// use strata_memory::allocator::{Allocator, PoolAllocator};
/// use strata_memory::error::OptionExt;
///
/// let pool = PoolAllocator::new(1, 64).unwrap();
/// let _first = pool.allocate(64, 8).or_alloc_error(64, 8).unwrap();
/// let second = pool.allocate(64, 8).or_alloc_error(64, 8);
/// assert!(second.unwrap_err().is_retryable());
/// ```
pub trait OptionExt {
    /// Converts `None` into [`MemoryError::AllocationFailed`]
    fn or_alloc_error(self, size: usize, align: usize) -> MemoryResult<NonNull<u8>>;
}

impl OptionExt for Option<NonNull<u8>> {
    #[inline]
    fn or_alloc_error(self, size: usize, align: usize) -> MemoryResult<NonNull<u8>> {
        self.ok_or_else(|| MemoryError::allocation_failed(size, align))
    }
}

// ============================================================================
// Tests
// ============================================================================
