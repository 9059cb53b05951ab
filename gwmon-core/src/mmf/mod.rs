//! The memory-mapped monitor file.
//!
//! Construction is a fixed sequence executed once at gateway startup:
//!
//! 1. [`MonitorLayout::plan`](crate::layout::MonitorLayout::plan) sizes the file.
//! 2. [`MonitorFile::create`] deletes any stale file, creates a zeroed one and maps it.
//! 3. [`write_metadata`] writes the skeleton with every region offset at `0` and
//!    returns the [`Skeleton`] every later step takes.
//! 4. [`publish_region`] (through [`RegionWriter`]) carves each owner's buffers and
//!    patches its offsets, making the region visible to readers.

mod file;
mod metadata;
mod region;

pub(crate) use file::ValueSlot;
pub use file::MonitorFile;
pub use metadata::{Skeleton, write_metadata};
pub use region::{
    CounterRegion, RegionWriter, create_gateway_labels_buffer, create_gateway_values_buffer,
    create_service_labels_buffer, create_service_values_buffer, publish_region,
};
