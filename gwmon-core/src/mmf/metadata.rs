//! Metadata skeleton writer.

use super::file::MonitorFile;
use crate::error::{GwmonError, Result};
use crate::layout::*;
use crate::types::{RegionKind, RegionOwner};

/// A monitor file whose metadata skeleton is complete.
///
/// Only [`write_metadata`] produces one, and every region publication takes
/// it, so no offset word can be patched before the skeleton pass has reset
/// it to `0`.
#[derive(Debug, Clone, Copy)]
pub struct Skeleton<'a> {
    file: &'a MonitorFile,
    layout: &'a MonitorLayout,
}

impl<'a> Skeleton<'a> {
    /// The monitor file.
    pub fn file(&self) -> &'a MonitorFile {
        self.file
    }

    /// The layout the skeleton was written for.
    pub fn layout(&self) -> &'a MonitorLayout {
        self.layout
    }
}

/// Write the complete metadata skeleton of a fresh monitor file.
///
/// Writes the version, both forward references, the gateway identifier,
/// the gateway region words, the service count, every descriptor entry and
/// every reference quad. Offset words are left at `0` (not yet published)
/// and are patched later by the region writers; lengths are final.
///
/// All strings are validated before the first byte is written, so a
/// rejected call leaves the file untouched. A file that already carries a
/// version word is refused: a second pass would reset offsets readers may
/// already have seen published.
pub fn write_metadata<'a, S: AsRef<str>>(
    file: &'a MonitorFile,
    layout: &'a MonitorLayout,
    gateway_id: &str,
    service_names: &[S],
) -> Result<Skeleton<'a>> {
    if service_names.len() != layout.service_count() {
        return Err(GwmonError::ServiceCountMismatch {
            expected: layout.service_count(),
            actual: service_names.len(),
        });
    }
    if file.len() < layout.total_length() {
        return Err(GwmonError::OutOfBounds {
            offset: 0,
            len: layout.total_length(),
            file_len: file.len(),
        });
    }
    check_slot("gateway identifier", gateway_id)?;
    for (i, name) in service_names.iter().enumerate() {
        check_slot(&format!("service {} name", i), name.as_ref())?;
    }
    let version = file.get_u32(VERSION_FIELD)?;
    if version != 0 {
        return Err(GwmonError::MetadataWritten {
            path: file.path().to_path_buf(),
            version,
        });
    }

    file.put_u32(VERSION_FIELD, MONITOR_VERSION)?;
    file.put_u32(GATEWAY_DATA_REFERENCE_FIELD, GATEWAY_DATA_FIELD as u32)?;
    file.put_u32(SERVICE_DATA_REFERENCE_FIELD, SERVICE_DATA_FIELD as u32)?;
    file.put_str(GATEWAY_ID_FIELD, "gateway identifier", gateway_id)?;
    write_region_words(file, layout, RegionOwner::Gateway)?;
    file.put_u32(SERVICE_COUNT_FIELD, layout.service_count() as u32)?;

    for (i, name) in service_names.iter().enumerate() {
        file.put_str(layout.service_name_field(i)?, "service name", name.as_ref())?;
        file.put_u32(layout.service_reserved_field(i)?, 0)?;
        write_region_words(file, layout, RegionOwner::Service(i))?;
    }

    tracing::debug!(
        gateway_id = %gateway_id,
        services = layout.service_count(),
        end_of_metadata = layout.end_of_metadata(),
        "Wrote monitor metadata"
    );

    Ok(Skeleton { file, layout })
}

/// Offsets as the unpublished sentinel, lengths as their final values.
fn write_region_words(file: &MonitorFile, layout: &MonitorLayout, owner: RegionOwner) -> Result<()> {
    for kind in [RegionKind::Labels, RegionKind::Values] {
        file.put_u32(layout.offset_field(owner, kind)?, 0)?;
        file.put_u32(layout.length_field(owner, kind)?, layout.region_length(owner, kind))?;
    }
    Ok(())
}

fn check_slot(field: &str, value: &str) -> Result<()> {
    if value.len() > MAX_STRING_LENGTH {
        return Err(GwmonError::StringTooLong {
            field: field.to_string(),
            length: value.len(),
            max: MAX_STRING_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_layout(services: usize) -> MonitorLayout {
        MonitorLayout::plan_with(services, BufferSizes::for_counters(8)).unwrap()
    }

    #[test]
    fn header_fields_are_written() {
        let dir = tempdir().unwrap();
        let layout = small_layout(2);
        let file = MonitorFile::create(dir.path(), "gw-1", layout.total_length()).unwrap();

        write_metadata(&file, &layout, "gw-1", &["A", "B"]).unwrap();

        assert_eq!(file.get_u32(VERSION_FIELD).unwrap(), MONITOR_VERSION);
        assert_eq!(file.get_u32(GATEWAY_DATA_REFERENCE_FIELD).unwrap(), 12);
        assert_eq!(file.get_u32(SERVICE_DATA_REFERENCE_FIELD).unwrap(), 1052);
        assert_eq!(file.get_str(GATEWAY_ID_FIELD).unwrap(), "gw-1");
        assert_eq!(file.get_u32(SERVICE_COUNT_FIELD).unwrap(), 2);
        assert_eq!(file.get_str(layout.service_name_field(0).unwrap()).unwrap(), "A");
        assert_eq!(file.get_str(layout.service_name_field(1).unwrap()).unwrap(), "B");
    }

    #[test]
    fn offsets_start_unpublished_and_lengths_final() {
        let dir = tempdir().unwrap();
        let layout = small_layout(3);
        let file = MonitorFile::create(dir.path(), "gw", layout.total_length()).unwrap();
        write_metadata(&file, &layout, "gw", &["a", "b", "c"]).unwrap();

        for owner in layout.owners() {
            for kind in [RegionKind::Labels, RegionKind::Values] {
                let offset = file.get_u32(layout.offset_field(owner, kind).unwrap()).unwrap();
                let length = file.get_u32(layout.length_field(owner, kind).unwrap()).unwrap();
                assert_eq!(offset, 0, "{} {}", owner, kind);
                assert_eq!(length, layout.region_length(owner, kind));
            }
        }
    }

    #[test]
    fn service_count_must_match_layout() {
        let dir = tempdir().unwrap();
        let layout = small_layout(2);
        let file = MonitorFile::create(dir.path(), "gw", layout.total_length()).unwrap();

        let err = write_metadata(&file, &layout, "gw", &["only-one"]).unwrap_err();
        assert_eq!(err.code(), "E103");
        assert_eq!(file.get_u32(VERSION_FIELD).unwrap(), 0);
    }

    #[test]
    fn oversized_name_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let layout = small_layout(1);
        let file = MonitorFile::create(dir.path(), "gw", layout.total_length()).unwrap();

        let long = "s".repeat(MAX_STRING_LENGTH + 1);
        let err = write_metadata(&file, &layout, "gw", &[long]).unwrap_err();
        assert_eq!(err.code(), "E201");
        assert_eq!(file.get_u32(VERSION_FIELD).unwrap(), 0);
        assert_eq!(file.get_u32(GATEWAY_ID_FIELD).unwrap(), 0);
    }

    #[test]
    fn second_pass_keeps_published_offsets() {
        let dir = tempdir().unwrap();
        let layout = small_layout(1);
        let file = MonitorFile::create(dir.path(), "gw", layout.total_length()).unwrap();
        let skeleton = write_metadata(&file, &layout, "gw", &["A"]).unwrap();
        let region = crate::mmf::create_gateway_labels_buffer(&skeleton).unwrap();

        let err = write_metadata(&file, &layout, "gw", &["A"]).unwrap_err();
        assert_eq!(err.code(), "E007");
        let field = layout.offset_field(RegionOwner::Gateway, RegionKind::Labels).unwrap();
        assert_eq!(file.get_u32(field).unwrap() as usize, region.offset());
    }

    #[test]
    fn name_at_slot_limit_is_accepted() {
        let dir = tempdir().unwrap();
        let layout = small_layout(1);
        let file = MonitorFile::create(dir.path(), "gw", layout.total_length()).unwrap();

        let name = "n".repeat(MAX_STRING_LENGTH);
        write_metadata(&file, &layout, "gw", &[name.as_str()]).unwrap();
        assert_eq!(file.get_str(layout.service_name_field(0).unwrap()).unwrap(), name);
        assert_eq!(file.get_u32(layout.service_reserved_field(0).unwrap()).unwrap(), 0);
    }
}
