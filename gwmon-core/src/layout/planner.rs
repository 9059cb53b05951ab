//! Layout planning.
//!
//! Every offset in a monitor file is a pure function of the number of
//! monitored services and the configured buffer sizes. The planner computes
//! them once, before the file exists, so the file can be sized exactly.

use super::constants::*;
use crate::error::{GwmonError, Result};
use crate::types::{RegionKind, RegionOwner, RegionSpan};
use serde::{Deserialize, Serialize};

/// Sizes of the counter buffers carved out after the metadata.
///
/// The defaults are the format's static capacity budget: a 1 MiB values
/// buffer and a labels buffer 32 times larger, for the gateway and for each
/// service. Lengths are written into the file, so readers never assume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSizes {
    /// Gateway labels buffer length.
    pub gateway_labels: u32,
    /// Gateway values buffer length.
    pub gateway_values: u32,
    /// Per-service labels buffer length.
    pub service_labels: u32,
    /// Per-service values buffer length.
    pub service_values: u32,
}

impl Default for BufferSizes {
    fn default() -> Self {
        Self {
            gateway_labels: GATEWAY_LABELS_BUFFER_LENGTH,
            gateway_values: GATEWAY_VALUES_BUFFER_LENGTH,
            service_labels: SERVICE_LABELS_BUFFER_LENGTH,
            service_values: SERVICE_VALUES_BUFFER_LENGTH,
        }
    }
}

impl BufferSizes {
    /// Buffer sizes holding `counters` counters per owner.
    ///
    /// Keeps the 8-byte value / 256-byte label proportion of the defaults.
    /// `counters` should be a multiple of 8 so the values buffer stays
    /// cache-line sized.
    pub fn for_counters(counters: u32) -> Self {
        let values = counters.saturating_mul(VALUE_SLOT_LENGTH as u32);
        let labels = counters.saturating_mul(LABEL_RECORD_LENGTH as u32);
        Self {
            gateway_labels: labels,
            gateway_values: values,
            service_labels: labels,
            service_values: values,
        }
    }

    /// Bytes taken by one service's label and value buffers.
    #[must_use]
    pub const fn service_stride(&self) -> u64 {
        self.service_labels as u64 + self.service_values as u64
    }

    /// Bytes taken by the gateway's label and value buffers.
    #[must_use]
    pub const fn gateway_total(&self) -> u64 {
        self.gateway_labels as u64 + self.gateway_values as u64
    }

    /// Check every buffer keeps region starts cache-line aligned and non-empty.
    pub fn validate(&self) -> Result<()> {
        for (name, length) in [
            ("gateway labels", self.gateway_labels),
            ("gateway values", self.gateway_values),
            ("service labels", self.service_labels),
            ("service values", self.service_values),
        ] {
            if length == 0 {
                return Err(GwmonError::InvalidBufferSize {
                    name,
                    length,
                    cause: "buffer must not be empty".to_string(),
                });
            }
            if length as usize % CACHE_LINE_LENGTH != 0 {
                return Err(GwmonError::InvalidBufferSize {
                    name,
                    length,
                    cause: format!("must be a multiple of {} bytes", CACHE_LINE_LENGTH),
                });
            }
        }
        Ok(())
    }
}

/// Immutable plan of a monitor file for a fixed number of services.
///
/// The header and descriptor table grow forward from offset 0. The reference
/// quads sit immediately before `end_of_metadata`, so quad `i` lives at
/// `reference_section_offset + i * 16` regardless of name contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorLayout {
    service_count: usize,
    metadata_length: usize,
    end_of_metadata: usize,
    reference_section_offset: usize,
    total_length: usize,
    sizes: BufferSizes,
}

impl MonitorLayout {
    /// Plan the layout for `service_count` services with the default buffer sizes.
    pub fn plan(service_count: usize) -> Result<Self> {
        Self::plan_with(service_count, BufferSizes::default())
    }

    /// Plan the layout with explicit buffer sizes.
    ///
    /// Fails if any offset or the total length would not fit in a format word.
    pub fn plan_with(service_count: usize, sizes: BufferSizes) -> Result<Self> {
        sizes.validate()?;

        let overflow = |cause: &str| GwmonError::LayoutOverflow {
            service_count,
            cause: cause.to_string(),
        };

        let per_service = STRING_SLOT_SIZE + PER_SERVICE_WORDS * WORD_SIZE;
        let metadata_length = service_count
            .checked_mul(per_service)
            .and_then(|services| services.checked_add(SERVICE_TABLE_FIELD))
            .ok_or_else(|| overflow("metadata length"))?;
        if metadata_length > u32::MAX as usize {
            return Err(overflow("metadata length"));
        }
        let end_of_metadata = align_up(metadata_length + WORD_SIZE, CACHE_LINE_LENGTH);
        let reference_section_offset = end_of_metadata - service_count * REFERENCE_QUAD_SIZE;

        let total_length = (service_count as u64)
            .checked_mul(sizes.service_stride())
            .and_then(|services| services.checked_add(sizes.gateway_total()))
            .and_then(|buffers| buffers.checked_add(end_of_metadata as u64))
            .ok_or_else(|| overflow("total file length"))?;

        // Region offsets are published as 4-byte words.
        if total_length > u32::MAX as u64 {
            return Err(overflow(&format!(
                "total file length {} exceeds {}",
                total_length,
                u32::MAX
            )));
        }

        Ok(Self {
            service_count,
            metadata_length,
            end_of_metadata,
            reference_section_offset,
            total_length: total_length as usize,
            sizes,
        })
    }

    /// Number of monitored services.
    pub fn service_count(&self) -> usize {
        self.service_count
    }

    /// Bytes used by header, descriptor table and reference quads.
    pub fn metadata_length(&self) -> usize {
        self.metadata_length
    }

    /// Cache-line aligned boundary where the first counter region starts.
    pub fn end_of_metadata(&self) -> usize {
        self.end_of_metadata
    }

    /// Offset of the first reference quad.
    pub fn reference_section_offset(&self) -> usize {
        self.reference_section_offset
    }

    /// Exact size of the monitor file.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Buffer sizes this layout was planned with.
    pub fn sizes(&self) -> BufferSizes {
        self.sizes
    }

    /// The metadata region `[0, end_of_metadata)`.
    pub fn metadata_span(&self) -> RegionSpan {
        RegionSpan::new(0, self.end_of_metadata as u32)
    }

    fn check_service(&self, index: usize) -> Result<()> {
        if index >= self.service_count {
            return Err(GwmonError::UnknownService {
                index,
                service_count: self.service_count,
            });
        }
        Ok(())
    }

    /// Offset of service `index`'s name slot in the descriptor table.
    pub fn service_name_field(&self, index: usize) -> Result<usize> {
        self.check_service(index)?;
        Ok(SERVICE_TABLE_FIELD + index * SERVICE_ENTRY_SIZE)
    }

    /// Offset of service `index`'s reserved descriptor word.
    pub fn service_reserved_field(&self, index: usize) -> Result<usize> {
        Ok(self.service_name_field(index)? + STRING_SLOT_SIZE)
    }

    /// Offset of service `index`'s reference quad.
    pub fn reference_quad_field(&self, index: usize) -> Result<usize> {
        self.check_service(index)?;
        Ok(self.reference_section_offset + index * REFERENCE_QUAD_SIZE)
    }

    /// Offset of the word holding the published offset of `owner`'s `kind` region.
    pub fn offset_field(&self, owner: RegionOwner, kind: RegionKind) -> Result<usize> {
        match (owner, kind) {
            (RegionOwner::Gateway, RegionKind::Labels) => Ok(GATEWAY_LABELS_OFFSET_FIELD),
            (RegionOwner::Gateway, RegionKind::Values) => Ok(GATEWAY_VALUES_OFFSET_FIELD),
            (RegionOwner::Service(i), RegionKind::Labels) => {
                Ok(self.reference_quad_field(i)? + QUAD_LABELS_OFFSET)
            }
            (RegionOwner::Service(i), RegionKind::Values) => {
                Ok(self.reference_quad_field(i)? + QUAD_VALUES_OFFSET)
            }
        }
    }

    /// Offset of the word holding the length of `owner`'s `kind` region.
    pub fn length_field(&self, owner: RegionOwner, kind: RegionKind) -> Result<usize> {
        match (owner, kind) {
            (RegionOwner::Gateway, RegionKind::Labels) => Ok(GATEWAY_LABELS_LENGTH_FIELD),
            (RegionOwner::Gateway, RegionKind::Values) => Ok(GATEWAY_VALUES_LENGTH_FIELD),
            (RegionOwner::Service(i), RegionKind::Labels) => {
                Ok(self.reference_quad_field(i)? + QUAD_LABELS_LENGTH)
            }
            (RegionOwner::Service(i), RegionKind::Values) => {
                Ok(self.reference_quad_field(i)? + QUAD_VALUES_LENGTH)
            }
        }
    }

    /// The byte range of `owner`'s `kind` region.
    ///
    /// Gateway labels come first, then gateway values, then each service's
    /// labels and values at a fixed stride.
    pub fn region(&self, owner: RegionOwner, kind: RegionKind) -> Result<RegionSpan> {
        let sizes = &self.sizes;
        let (pair_start, labels_len, values_len) = match owner {
            RegionOwner::Gateway => (
                self.end_of_metadata as u64,
                sizes.gateway_labels,
                sizes.gateway_values,
            ),
            RegionOwner::Service(i) => {
                self.check_service(i)?;
                (
                    self.end_of_metadata as u64
                        + sizes.gateway_total()
                        + i as u64 * sizes.service_stride(),
                    sizes.service_labels,
                    sizes.service_values,
                )
            }
        };
        // Bounded by total_length, which plan_with checked against u32::MAX.
        let span = match kind {
            RegionKind::Labels => RegionSpan::new(pair_start as u32, labels_len),
            RegionKind::Values => RegionSpan::new((pair_start + labels_len as u64) as u32, values_len),
        };
        Ok(span)
    }

    /// Fixed length of `owner`'s `kind` region.
    pub fn region_length(&self, owner: RegionOwner, kind: RegionKind) -> u32 {
        match (owner, kind) {
            (RegionOwner::Gateway, RegionKind::Labels) => self.sizes.gateway_labels,
            (RegionOwner::Gateway, RegionKind::Values) => self.sizes.gateway_values,
            (RegionOwner::Service(_), RegionKind::Labels) => self.sizes.service_labels,
            (RegionOwner::Service(_), RegionKind::Values) => self.sizes.service_values,
        }
    }

    /// All region owners in file order.
    pub fn owners(&self) -> impl Iterator<Item = RegionOwner> + '_ {
        std::iter::once(RegionOwner::Gateway).chain((0..self.service_count).map(RegionOwner::Service))
    }
}
