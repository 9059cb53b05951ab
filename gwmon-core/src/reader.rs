//! Read-only access to a monitor file from another process.
//!
//! A reader maps the file read-only and follows the publication protocol:
//! the version word is checked before anything is decoded, and a region
//! offset of `0` means the writer has not handed that region out yet.
//! Offset words and value slots are loaded with acquire ordering, so
//! everything the writer stored before publishing is visible.
//!
//! The version word is written first, so a reader opened while the gateway
//! is still writing the header may see a partial skeleton. Header fields are
//! therefore read from the mapping on every call rather than cached at open.

use crate::error::{GwmonError, Result};
use crate::layout::*;
use crate::types::{RegionKind, RegionOwner};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Published offsets and lengths of one owner's region pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionRefs {
    /// Labels buffer offset, `None` while unpublished.
    pub labels_offset: Option<u32>,
    /// Labels buffer length.
    pub labels_length: u32,
    /// Values buffer offset, `None` while unpublished.
    pub values_offset: Option<u32>,
    /// Values buffer length.
    pub values_length: u32,
}

impl RegionRefs {
    /// Whether both buffers are published.
    pub fn is_published(&self) -> bool {
        self.labels_offset.is_some() && self.values_offset.is_some()
    }

    /// Offset of `kind`, if published.
    pub fn offset(&self, kind: RegionKind) -> Option<u32> {
        match kind {
            RegionKind::Labels => self.labels_offset,
            RegionKind::Values => self.values_offset,
        }
    }
}

/// One counter as seen by a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Counter label.
    pub label: String,
    /// Value at the time of the read.
    pub value: u64,
}

/// Regions and counters of one owner.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSnapshot {
    /// Gateway identifier or service name.
    pub name: String,
    /// Published region references.
    pub regions: RegionRefs,
    /// Counters, when requested and the regions are published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<Vec<CounterSnapshot>>,
}

/// Everything a reader can see in a monitor file.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    /// Path of the monitor file.
    pub path: PathBuf,
    /// Format version.
    pub version: u32,
    /// File length in bytes.
    pub length: usize,
    /// The gateway's own regions.
    pub gateway: OwnerSnapshot,
    /// Monitored services in file order.
    pub services: Vec<OwnerSnapshot>,
}

/// Read-only view of a monitor file.
///
/// The mapping is shared with the writer, so values read through the same
/// reader change as the gateway updates its counters.
#[derive(Debug)]
pub struct MonitorReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MonitorReader {
    /// Open and validate the monitor file at `path`.
    ///
    /// Returns [`GwmonError::NotPublished`] for a file whose header has not
    /// been written yet, so callers can poll a gateway that is starting up.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| GwmonError::FileOpen {
            path: path.clone(),
            cause: e.to_string(),
        })?;
        let file_len = file
            .metadata()
            .map_err(|e| GwmonError::FileOpen {
                path: path.clone(),
                cause: e.to_string(),
            })?
            .len();

        if file_len == 0 {
            return Err(GwmonError::NotPublished {
                owner: "header".to_string(),
            });
        }
        if file_len < SERVICE_TABLE_FIELD as u64 {
            return Err(GwmonError::Corrupt {
                offset: 0,
                cause: format!("file is {} bytes, shorter than the header", file_len),
            });
        }

        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| GwmonError::FileMmap {
                path: path.clone(),
                cause: e.to_string(),
            })?
        };

        let reader = Self { mmap, path };

        let version = reader.load_u32(VERSION_FIELD)?;
        if version == 0 {
            return Err(GwmonError::NotPublished {
                owner: "header".to_string(),
            });
        }
        if version != MONITOR_VERSION {
            return Err(GwmonError::VersionMismatch {
                expected: MONITOR_VERSION,
                found: version,
            });
        }

        let (service_count, _) = reader.service_table()?;

        tracing::debug!(
            path = %reader.path.display(),
            services = service_count,
            "Opened monitor file"
        );

        Ok(reader)
    }

    /// Path of the monitor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the file in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the file is empty. Always false for an opened reader.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Format version (always [`MONITOR_VERSION`] once opened).
    pub fn version(&self) -> u32 {
        MONITOR_VERSION
    }

    /// Number of monitored services currently written in the header.
    pub fn service_count(&self) -> Result<usize> {
        self.service_table().map(|(count, _)| count)
    }

    /// Gateway identifier.
    pub fn gateway_id(&self) -> Result<String> {
        self.read_str(GATEWAY_ID_FIELD)
    }

    /// Name of service `index`.
    pub fn service_name(&self, index: usize) -> Result<String> {
        self.check_service(index)?;
        self.read_str(SERVICE_TABLE_FIELD + index * SERVICE_ENTRY_SIZE)
    }

    /// All service names in file order.
    pub fn service_names(&self) -> Result<Vec<String>> {
        (0..self.service_count()?).map(|i| self.service_name(i)).collect()
    }

    /// Region references of the gateway.
    pub fn gateway_regions(&self) -> Result<RegionRefs> {
        self.regions(RegionOwner::Gateway)
    }

    /// Region references of service `index`.
    pub fn service_regions(&self, index: usize) -> Result<RegionRefs> {
        self.regions(RegionOwner::Service(index))
    }

    /// Counters allocated by the gateway.
    pub fn gateway_counters(&self) -> Result<Vec<CounterSnapshot>> {
        self.counters(RegionOwner::Gateway)
    }

    /// Counters allocated by service `index`.
    pub fn service_counters(&self, index: usize) -> Result<Vec<CounterSnapshot>> {
        self.counters(RegionOwner::Service(index))
    }

    /// Read the whole file, optionally including every counter.
    ///
    /// Owners whose regions are unpublished have no counters in the result.
    pub fn snapshot(&self, include_counters: bool) -> Result<MonitorSnapshot> {
        let owner_snapshot = |owner: RegionOwner, name: String| -> Result<OwnerSnapshot> {
            let regions = self.regions(owner)?;
            let counters = if include_counters && regions.is_published() {
                Some(self.counters(owner)?)
            } else {
                None
            };
            Ok(OwnerSnapshot {
                name,
                regions,
                counters,
            })
        };

        let gateway = owner_snapshot(RegionOwner::Gateway, self.gateway_id()?)?;
        let services = (0..self.service_count()?)
            .map(|i| owner_snapshot(RegionOwner::Service(i), self.service_name(i)?))
            .collect::<Result<Vec<_>>>()?;

        Ok(MonitorSnapshot {
            path: self.path.clone(),
            version: self.version(),
            length: self.len(),
            gateway,
            services,
        })
    }

    /// Current service count and the offset of the reference section it implies.
    fn service_table(&self) -> Result<(usize, usize)> {
        let service_count = self.load_u32(SERVICE_COUNT_FIELD)? as usize;
        let end_of_metadata = service_count
            .checked_mul(SERVICE_ENTRY_SIZE + REFERENCE_QUAD_SIZE)
            .and_then(|services| services.checked_add(SERVICE_TABLE_FIELD + WORD_SIZE))
            .map(|length| align_up(length, CACHE_LINE_LENGTH))
            .filter(|end| *end <= self.mmap.len())
            .ok_or_else(|| GwmonError::Corrupt {
                offset: SERVICE_COUNT_FIELD,
                cause: format!("service count {} does not fit the file", service_count),
            })?;
        Ok((service_count, end_of_metadata - service_count * REFERENCE_QUAD_SIZE))
    }

    fn check_service(&self, index: usize) -> Result<usize> {
        let (service_count, reference_section) = self.service_table()?;
        if index >= service_count {
            return Err(GwmonError::UnknownService { index, service_count });
        }
        Ok(reference_section)
    }

    /// Word offsets of `owner`'s (labels offset, labels length, values offset, values length).
    fn region_fields(&self, owner: RegionOwner) -> Result<[usize; 4]> {
        Ok(match owner {
            RegionOwner::Gateway => [
                GATEWAY_LABELS_OFFSET_FIELD,
                GATEWAY_LABELS_LENGTH_FIELD,
                GATEWAY_VALUES_OFFSET_FIELD,
                GATEWAY_VALUES_LENGTH_FIELD,
            ],
            RegionOwner::Service(i) => {
                let quad = self.check_service(i)? + i * REFERENCE_QUAD_SIZE;
                [
                    quad + QUAD_LABELS_OFFSET,
                    quad + QUAD_LABELS_LENGTH,
                    quad + QUAD_VALUES_OFFSET,
                    quad + QUAD_VALUES_LENGTH,
                ]
            }
        })
    }

    fn regions(&self, owner: RegionOwner) -> Result<RegionRefs> {
        let [labels_offset, labels_length, values_offset, values_length] = self.region_fields(owner)?;
        let refs = RegionRefs {
            labels_offset: self.published_offset(labels_offset)?,
            labels_length: self.read_u32(labels_length)?,
            values_offset: self.published_offset(values_offset)?,
            values_length: self.read_u32(values_length)?,
        };

        for (field, offset, length) in [
            (labels_offset, refs.labels_offset, refs.labels_length),
            (values_offset, refs.values_offset, refs.values_length),
        ] {
            let Some(offset) = offset else { continue };
            let end = offset as u64 + length as u64;
            if end > self.mmap.len() as u64 || (offset as usize) % VALUE_SLOT_LENGTH != 0 {
                return Err(GwmonError::Corrupt {
                    offset: field,
                    cause: format!("region [{}, {}) is not a valid region of the file", offset, end),
                });
            }
        }
        Ok(refs)
    }

    fn counters(&self, owner: RegionOwner) -> Result<Vec<CounterSnapshot>> {
        let refs = self.regions(owner)?;
        let (Some(labels), Some(values)) = (refs.labels_offset, refs.values_offset) else {
            return Err(GwmonError::NotPublished {
                owner: owner.to_string(),
            });
        };
        let labels = labels as usize;
        let values = values as usize;
        let capacity = (refs.values_length as usize / VALUE_SLOT_LENGTH)
            .min(refs.labels_length as usize / LABEL_RECORD_LENGTH);

        let mut counters = Vec::new();
        for k in 0..capacity {
            let record = labels + k * LABEL_RECORD_LENGTH;
            let length = self.load_u32(record)? as usize;
            if length == 0 {
                break;
            }
            if length > MAX_LABEL_LENGTH {
                return Err(GwmonError::Corrupt {
                    offset: record,
                    cause: format!("label length {} exceeds record", length),
                });
            }
            let label = self.decode_str(record, length)?;
            let value = self.load_u64(values + k * VALUE_SLOT_LENGTH)?;
            counters.push(CounterSnapshot { label, value });
        }
        Ok(counters)
    }

    fn published_offset(&self, field: usize) -> Result<Option<u32>> {
        let offset = self.load_u32(field)?;
        Ok((offset != 0).then_some(offset))
    }

    fn bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.mmap.get(offset..end))
            .ok_or(GwmonError::OutOfBounds {
                offset,
                len,
                file_len: self.mmap.len(),
            })
    }

    fn read_u32(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(offset, WORD_SIZE)?))
    }

    fn load_u32(&self, offset: usize) -> Result<u32> {
        let ptr = self.atomic_ptr(offset, WORD_SIZE)?;
        // SAFETY: in bounds and 4-byte aligned; only ever loaded.
        let word = unsafe { AtomicU32::from_ptr(ptr.cast::<u32>()) }.load(Ordering::Acquire);
        Ok(u32::from_le(word))
    }

    fn load_u64(&self, offset: usize) -> Result<u64> {
        let ptr = self.atomic_ptr(offset, VALUE_SLOT_LENGTH)?;
        // SAFETY: in bounds and 8-byte aligned; only ever loaded.
        Ok(unsafe { AtomicU64::from_ptr(ptr.cast::<u64>()) }.load(Ordering::Acquire))
    }

    fn atomic_ptr(&self, offset: usize, len: usize) -> Result<*mut u8> {
        let bytes = self.bytes(offset, len)?;
        if offset % len != 0 {
            return Err(GwmonError::Corrupt {
                offset,
                cause: format!("atomic access requires {}-byte alignment", len),
            });
        }
        Ok(bytes.as_ptr().cast_mut())
    }

    fn read_str(&self, offset: usize) -> Result<String> {
        let length = self.load_u32(offset)? as usize;
        if length > MAX_STRING_LENGTH {
            return Err(GwmonError::Corrupt {
                offset,
                cause: format!("string length {} exceeds slot", length),
            });
        }
        self.decode_str(offset, length)
    }

    fn decode_str(&self, offset: usize, length: usize) -> Result<String> {
        let bytes = self.bytes(offset + WORD_SIZE, length)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| GwmonError::Corrupt {
            offset,
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::MonitoringEntityFactory;
    use crate::mmf::{MonitorFile, RegionWriter, create_service_labels_buffer, write_metadata};
    use tempfile::{TempDir, tempdir};

    fn blank_file(services: usize) -> (TempDir, MonitorFile, MonitorLayout) {
        let dir = tempdir().unwrap();
        let layout = MonitorLayout::plan_with(services, BufferSizes::for_counters(8)).unwrap();
        let file = MonitorFile::create(dir.path(), "gw-1", layout.total_length()).unwrap();
        (dir, file, layout)
    }

    fn small_file(services: &[&str]) -> (TempDir, MonitorFile, MonitorLayout) {
        let (dir, file, layout) = blank_file(services.len());
        write_metadata(&file, &layout, "gw-1", services).unwrap();
        (dir, file, layout)
    }

    #[test]
    fn reads_metadata() {
        let (_dir, file, _layout) = small_file(&["A", "B"]);
        let reader = MonitorReader::open(file.path()).unwrap();

        assert_eq!(reader.version(), MONITOR_VERSION);
        assert_eq!(reader.gateway_id().unwrap(), "gw-1");
        assert_eq!(reader.service_count().unwrap(), 2);
        assert_eq!(reader.service_names().unwrap(), vec!["A", "B"]);
        assert_eq!(reader.len(), file.len());
    }

    #[test]
    fn unpublished_regions_read_as_none() {
        let (_dir, file, layout) = small_file(&["A"]);
        let reader = MonitorReader::open(file.path()).unwrap();

        let refs = reader.service_regions(0).unwrap();
        assert_eq!(refs.labels_offset, None);
        assert_eq!(refs.values_offset, None);
        assert_eq!(refs.values_length, layout.sizes().service_values);
        assert!(!refs.is_published());

        let err = reader.service_counters(0).unwrap_err();
        assert_eq!(err.code(), "E303");
        assert!(err.is_retriable());
    }

    #[test]
    fn sees_publication_through_the_same_mapping() {
        let (_dir, file, layout) = blank_file(1);
        let skeleton = write_metadata(&file, &layout, "gw-1", &["A"]).unwrap();
        let reader = MonitorReader::open(file.path()).unwrap();
        assert!(reader.service_regions(0).unwrap().labels_offset.is_none());

        let region = create_service_labels_buffer(&skeleton, 0).unwrap();
        let refs = reader.service_regions(0).unwrap();
        assert_eq!(refs.labels_offset, Some(region.offset() as u32));
        assert_eq!(refs.values_offset, None);
    }

    #[test]
    fn reads_counters_in_allocation_order() {
        let (_dir, file, layout) = blank_file(1);
        let skeleton = write_metadata(&file, &layout, "gw-1", &["A"]).unwrap();
        let factory = RegionWriter::service(&skeleton, 0)
            .write_counters_factory("A")
            .unwrap();
        factory.create_counter("requests").unwrap().add(42);
        factory.create_counter("errors").unwrap().increment();

        let reader = MonitorReader::open(file.path()).unwrap();
        let counters = reader.service_counters(0).unwrap();
        assert_eq!(
            counters,
            vec![
                CounterSnapshot {
                    label: "requests".to_string(),
                    value: 42
                },
                CounterSnapshot {
                    label: "errors".to_string(),
                    value: 1
                },
            ]
        );
    }

    #[test]
    fn snapshot_skips_counters_of_unpublished_owners() {
        let (_dir, file, layout) = blank_file(2);
        let skeleton = write_metadata(&file, &layout, "gw-1", &["A", "B"]).unwrap();
        let gateway = RegionWriter::gateway(&skeleton)
            .write_counters_factory("gw-1")
            .unwrap();
        gateway.create_counter("uptime").unwrap().set(7);

        let snapshot = MonitorReader::open(file.path()).unwrap().snapshot(true).unwrap();
        assert_eq!(snapshot.gateway.name, "gw-1");
        assert_eq!(snapshot.gateway.counters.as_ref().unwrap()[0].value, 7);
        assert_eq!(snapshot.services.len(), 2);
        assert!(snapshot.services.iter().all(|s| s.counters.is_none()));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["services"][1]["name"], "B");
        assert!(json["services"][1]["regions"]["labels_offset"].is_null());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let (_dir, file, _layout) = small_file(&[]);
        file.put_u32(VERSION_FIELD, 2).unwrap();

        let err = MonitorReader::open(file.path()).unwrap_err();
        assert!(matches!(
            err,
            GwmonError::VersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn unwritten_header_is_not_published() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw", 4096).unwrap();
        let err = MonitorReader::open(file.path()).unwrap_err();
        assert_eq!(err.code(), "E303");
    }

    #[test]
    fn header_written_after_open_becomes_visible() {
        let (_dir, file, layout) = blank_file(2);
        file.put_u32(VERSION_FIELD, MONITOR_VERSION).unwrap();

        let reader = MonitorReader::open(file.path()).unwrap();
        assert_eq!(reader.service_count().unwrap(), 0);
        assert!(reader.service_names().unwrap().is_empty());
        assert_eq!(reader.service_regions(0).unwrap_err().code(), "E105");

        // Rewind the version word so the full skeleton pass can run.
        file.put_u32(VERSION_FIELD, 0).unwrap();
        let skeleton = write_metadata(&file, &layout, "gw-1", &["A", "B"]).unwrap();
        RegionWriter::service(&skeleton, 1)
            .write_counters_factory("B")
            .unwrap()
            .create_counter("requests")
            .unwrap()
            .add(3);

        assert_eq!(reader.service_count().unwrap(), 2);
        assert_eq!(reader.service_names().unwrap(), vec!["A", "B"]);
        assert_eq!(reader.gateway_id().unwrap(), "gw-1");
        assert_eq!(reader.service_counters(1).unwrap()[0].value, 3);
        assert_eq!(reader.snapshot(false).unwrap().services.len(), 2);
    }

    #[test]
    fn bogus_service_count_is_corrupt() {
        let (_dir, file, _layout) = small_file(&["A"]);
        file.put_u32(SERVICE_COUNT_FIELD, 100_000).unwrap();
        let err = MonitorReader::open(file.path()).unwrap_err();
        assert_eq!(err.code(), "E304");
    }

    #[test]
    fn out_of_file_offset_is_corrupt() {
        let (_dir, file, _layout) = small_file(&[]);
        file.put_u32(GATEWAY_VALUES_OFFSET_FIELD, u32::MAX - 63).unwrap();
        let reader = MonitorReader::open(file.path()).unwrap();
        assert_eq!(reader.gateway_regions().unwrap_err().code(), "E304");
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempdir().unwrap();
        let err = MonitorReader::open(dir.path().join("absent")).unwrap_err();
        assert_eq!(err.code(), "E301");
    }
}
