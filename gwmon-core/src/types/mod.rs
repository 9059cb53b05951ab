//! Core types for gwmon.
//!
//! - `RegionSpan`: a byte range inside the monitor file
//! - `RegionKind`: whether a span holds counter labels or counter values
//! - `RegionOwner`: the gateway itself or one monitored service
//! - `ServiceDescriptor`: a monitored service and its fixed position in the file

mod owner;
mod span;

pub use owner::{RegionOwner, ServiceDescriptor};
pub use span::{RegionKind, RegionSpan};
