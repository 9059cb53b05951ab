//! Region writers: carve counter regions and publish their offsets.

use super::file::MonitorFile;
use super::metadata::Skeleton;
use crate::counters::MmfCounterFactory;
use crate::error::Result;
use crate::types::{RegionKind, RegionOwner, RegionSpan};

/// A labels or values buffer handed to one owner.
#[derive(Debug, Clone)]
pub struct CounterRegion {
    file: MonitorFile,
    owner: RegionOwner,
    kind: RegionKind,
    span: RegionSpan,
}

impl CounterRegion {
    /// Owner of the region.
    pub fn owner(&self) -> RegionOwner {
        self.owner
    }

    /// Labels or values.
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    /// Byte range of the region in the monitor file.
    pub fn span(&self) -> RegionSpan {
        self.span
    }

    /// Start offset of the region.
    pub fn offset(&self) -> usize {
        self.span.offset() as usize
    }

    /// Length of the region.
    pub fn len(&self) -> usize {
        self.span.length() as usize
    }

    /// Whether the region has no bytes.
    pub fn is_empty(&self) -> bool {
        self.span.length() == 0
    }

    pub(crate) fn file(&self) -> &MonitorFile {
        &self.file
    }
}

/// Carve out `owner`'s `kind` region and publish its offset.
///
/// The range is computed from the layout alone, then the matching offset
/// word is stored with release ordering. That store is the last write for
/// the region: until it happens readers see `0` and treat the region as
/// unavailable. Taking a [`Skeleton`] means the metadata pass has already
/// run, so the patch is never overwritten. Regions can be published in any
/// order.
pub fn publish_region(skeleton: &Skeleton<'_>, owner: RegionOwner, kind: RegionKind) -> Result<CounterRegion> {
    let layout = skeleton.layout();
    let file = skeleton.file();
    let span = layout.region(owner, kind)?;
    let field = layout.offset_field(owner, kind)?;
    file.publish_u32(field, span.offset())?;

    tracing::debug!(
        owner = %owner,
        kind = %kind,
        offset = span.offset(),
        length = span.length(),
        "Published counter region"
    );

    Ok(CounterRegion {
        file: file.clone(),
        owner,
        kind,
        span,
    })
}

/// Create and publish the gateway labels buffer.
pub fn create_gateway_labels_buffer(skeleton: &Skeleton<'_>) -> Result<CounterRegion> {
    publish_region(skeleton, RegionOwner::Gateway, RegionKind::Labels)
}

/// Create and publish the gateway values buffer.
pub fn create_gateway_values_buffer(skeleton: &Skeleton<'_>) -> Result<CounterRegion> {
    publish_region(skeleton, RegionOwner::Gateway, RegionKind::Values)
}

/// Create and publish service `index`'s labels buffer.
pub fn create_service_labels_buffer(skeleton: &Skeleton<'_>, index: usize) -> Result<CounterRegion> {
    publish_region(skeleton, RegionOwner::Service(index), RegionKind::Labels)
}

/// Create and publish service `index`'s values buffer.
pub fn create_service_values_buffer(skeleton: &Skeleton<'_>, index: usize) -> Result<CounterRegion> {
    publish_region(skeleton, RegionOwner::Service(index), RegionKind::Values)
}

/// Publishes one owner's region pair and hands out its counter factory.
///
/// One writer exists for the gateway and one per monitored service.
#[derive(Debug)]
pub struct RegionWriter<'a> {
    skeleton: Skeleton<'a>,
    owner: RegionOwner,
}

impl<'a> RegionWriter<'a> {
    /// Writer for the gateway's own counters.
    pub fn gateway(skeleton: &Skeleton<'a>) -> Self {
        Self {
            skeleton: *skeleton,
            owner: RegionOwner::Gateway,
        }
    }

    /// Writer for the service at `index`.
    pub fn service(skeleton: &Skeleton<'a>, index: usize) -> Self {
        Self {
            skeleton: *skeleton,
            owner: RegionOwner::Service(index),
        }
    }

    /// The owner this writer publishes for.
    pub fn owner(&self) -> RegionOwner {
        self.owner
    }

    /// Publish the labels buffer, then the values buffer, and return the
    /// factory bound to both.
    pub fn write_counters_factory(&self, name: impl Into<String>) -> Result<MmfCounterFactory> {
        let labels = publish_region(&self.skeleton, self.owner, RegionKind::Labels)?;
        let values = publish_region(&self.skeleton, self.owner, RegionKind::Values)?;
        Ok(MmfCounterFactory::new(name, labels, values))
    }
}
