//! Multi-tier pool allocator
//!
//! ## Modules
//! - `allocator` - Main `MultipoolAllocator` sharing one arena across depths
//! - `depth` - Depth level geometry and request routing

pub mod allocator;
pub mod depth;

pub use allocator::{DEFAULT_DEPTH, MultipoolAllocator};
pub use depth::DepthInfo;
