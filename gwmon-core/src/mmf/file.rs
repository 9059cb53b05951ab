//! Monitor file lifecycle and checked field access.

use crate::error::{GwmonError, Result};
use crate::layout::{MAX_STRING_LENGTH, WORD_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Shared mapping state.
///
/// `base` is taken from the mapping once at creation. All later access goes
/// through raw pointers into disjoint ranges, so no Rust reference ever
/// covers the whole mapping while owners write concurrently.
struct MappedFile {
    /// Keeps the mapping alive; never accessed through `&mut` after creation.
    mmap: MmapMut,
    base: *mut u8,
    len: usize,
    file: File,
    path: PathBuf,
}

// SAFETY: the mapping lives as long as `MappedFile`. Concurrent writers only
// touch disjoint byte ranges (metadata before sharing, then one region pair
// per owner), and shared words are accessed atomically.
unsafe impl Send for MappedFile {}
unsafe impl Sync for MappedFile {}

impl Drop for MappedFile {
    fn drop(&mut self) {
        let _ = self.mmap.flush();
        let _ = FileExt::unlock(&self.file);
    }
}

/// The memory-mapped monitor file, owned by the gateway process.
///
/// Cloning is cheap and yields another handle to the same mapping. The
/// mapping is released when the last handle (including handles held by
/// counters) is dropped. The file itself stays on disk for readers.
#[derive(Clone)]
pub struct MonitorFile {
    inner: Arc<MappedFile>,
}

impl std::fmt::Debug for MonitorFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorFile")
            .field("path", &self.inner.path)
            .field("len", &self.inner.len)
            .finish()
    }
}

impl MonitorFile {
    /// Create a fresh, zero-filled monitor file of `total_length` bytes and map it.
    ///
    /// Any file already named `identifier` in `directory` is deleted first:
    /// a file left by a previous run may have been planned for a different
    /// service count and must never be reused.
    pub fn create(directory: &Path, identifier: &str, total_length: usize) -> Result<Self> {
        validate_identifier(identifier)?;

        std::fs::create_dir_all(directory).map_err(|e| GwmonError::FileCreate {
            path: directory.to_path_buf(),
            cause: e.to_string(),
        })?;

        let path = directory.join(identifier);

        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed stale monitor file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(GwmonError::FileRemove {
                    path,
                    cause: format!("stale file: {}", e),
                });
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| GwmonError::FileCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        file.try_lock_exclusive()
            .map_err(|e| GwmonError::FileCreate {
                path: path.clone(),
                cause: format!("Failed to lock file: {}", e),
            })?;

        // A freshly extended file reads as zeros, which every offset word
        // relies on as its "not yet published" value.
        file.set_len(total_length as u64)
            .map_err(|e| GwmonError::FileCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        let mut mmap = unsafe {
            MmapOptions::new()
                .len(total_length)
                .map_mut(&file)
                .map_err(|e| GwmonError::FileMmap {
                    path: path.clone(),
                    cause: e.to_string(),
                })?
        };
        let base = mmap.as_mut_ptr();

        tracing::info!(
            path = %path.display(),
            bytes = total_length,
            "Created monitor file"
        );

        Ok(Self {
            inner: Arc::new(MappedFile {
                mmap,
                base,
                len: total_length,
                file,
                path,
            }),
        })
    }

    /// Path of the monitor file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Total length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Flush the mapping to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.inner.mmap.flush().map_err(|e| GwmonError::FileFlush {
            path: self.inner.path.clone(),
            cause: e.to_string(),
        })
    }

    /// Delete the monitor file from disk.
    ///
    /// Existing handles and counters keep their mapping; readers that open
    /// the path afterwards will not find it.
    pub fn remove(&self) -> Result<()> {
        std::fs::remove_file(&self.inner.path).map_err(|e| GwmonError::FileRemove {
            path: self.inner.path.clone(),
            cause: e.to_string(),
        })
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.inner.len => Ok(()),
            _ => Err(GwmonError::OutOfBounds {
                offset,
                len,
                file_len: self.inner.len,
            }),
        }
    }

    fn check_aligned(&self, offset: usize, len: usize) -> Result<()> {
        self.check(offset, len)?;
        if offset % len != 0 {
            return Err(GwmonError::Corrupt {
                offset,
                cause: format!("atomic access requires {}-byte alignment", len),
            });
        }
        Ok(())
    }

    /// Run `f` over `[offset, offset + len)`.
    ///
    /// The slice only lives for the duration of `f`. Callers must own the
    /// range: the metadata writer before regions are handed out, or a
    /// counter factory inside its own region.
    fn with_bytes_mut<R>(&self, offset: usize, len: usize, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        self.check(offset, len)?;
        // SAFETY: bounds checked above; ownership of the range is the
        // caller's contract described above.
        let bytes = unsafe { std::slice::from_raw_parts_mut(self.inner.base.add(offset), len) };
        Ok(f(bytes))
    }

    fn with_bytes<R>(&self, offset: usize, len: usize, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        self.check(offset, len)?;
        // SAFETY: bounds checked above.
        let bytes = unsafe { std::slice::from_raw_parts(self.inner.base.add(offset), len) };
        Ok(f(bytes))
    }

    /// Write a little-endian word.
    pub(crate) fn put_u32(&self, offset: usize, value: u32) -> Result<()> {
        self.with_bytes_mut(offset, WORD_SIZE, |b| LittleEndian::write_u32(b, value))
    }

    /// Read a little-endian word.
    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        self.with_bytes(offset, WORD_SIZE, LittleEndian::read_u32)
    }

    /// Write `value` into a fixed-width string slot (length word + UTF-8).
    pub(crate) fn put_str(&self, offset: usize, field: &str, value: &str) -> Result<()> {
        self.put_bytes_prefixed(offset, field, value, MAX_STRING_LENGTH)
    }

    /// Write a length-prefixed string of at most `max` bytes.
    ///
    /// The string bytes land before the length word, which is stored with
    /// release ordering so a reader that sees the length sees the text.
    pub(crate) fn put_bytes_prefixed(&self, offset: usize, field: &str, value: &str, max: usize) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > max {
            return Err(GwmonError::StringTooLong {
                field: field.to_string(),
                length: bytes.len(),
                max,
            });
        }
        self.check(offset, WORD_SIZE + max)?;
        self.with_bytes_mut(offset + WORD_SIZE, bytes.len(), |b| b.copy_from_slice(bytes))?;
        self.publish_u32(offset, bytes.len() as u32)
    }

    /// Read a fixed-width string slot.
    pub fn get_str(&self, offset: usize) -> Result<String> {
        let len = self.load_u32(offset)? as usize;
        if len > MAX_STRING_LENGTH {
            return Err(GwmonError::Corrupt {
                offset,
                cause: format!("string length {} exceeds slot", len),
            });
        }
        let bytes = self.with_bytes(offset + WORD_SIZE, len, <[u8]>::to_vec)?;
        String::from_utf8(bytes).map_err(|e| GwmonError::Corrupt {
            offset,
            cause: e.to_string(),
        })
    }

    fn atomic_u32(&self, offset: usize) -> Result<&AtomicU32> {
        self.check_aligned(offset, WORD_SIZE)?;
        // SAFETY: in bounds and 4-byte aligned (the mapping is page aligned).
        Ok(unsafe { AtomicU32::from_ptr(self.inner.base.add(offset).cast::<u32>()) })
    }

    /// Store a word with release ordering.
    ///
    /// This is the publication step for offset fields: every write the
    /// caller made before it is visible to a reader that observes the word.
    pub(crate) fn publish_u32(&self, offset: usize, value: u32) -> Result<()> {
        self.atomic_u32(offset)?.store(value.to_le(), Ordering::Release);
        Ok(())
    }

    /// Load a word with acquire ordering.
    pub fn load_u32(&self, offset: usize) -> Result<u32> {
        Ok(u32::from_le(self.atomic_u32(offset)?.load(Ordering::Acquire)))
    }

    /// Handle to the 8-byte counter slot at `offset`.
    pub(crate) fn value_slot(&self, offset: usize) -> Result<ValueSlot> {
        self.check_aligned(offset, 8)?;
        Ok(ValueSlot {
            file: self.clone(),
            offset,
        })
    }
}

/// An 8-byte atomic counter slot inside the mapping.
///
/// Holds a handle to the mapping, so the slot stays valid for as long as
/// the slot exists.
#[derive(Clone)]
pub(crate) struct ValueSlot {
    file: MonitorFile,
    offset: usize,
}

impl ValueSlot {
    pub(crate) fn atomic(&self) -> &AtomicU64 {
        // SAFETY: bounds and 8-byte alignment checked in `value_slot`; the
        // mapping outlives `self` through `self.file`.
        unsafe { AtomicU64::from_ptr(self.file.inner.base.add(self.offset).cast::<u64>()) }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }
}

/// Reject identifiers that would escape the monitor directory.
fn validate_identifier(identifier: &str) -> Result<()> {
    let invalid = |cause: &str| GwmonError::InvalidIdentifier {
        identifier: identifier.to_string(),
        cause: cause.to_string(),
    };

    if identifier.is_empty() {
        return Err(invalid("identifier is empty"));
    }
    if identifier == "." || identifier == ".." {
        return Err(invalid("identifier is a directory reference"));
    }
    if identifier.contains(['/', '\\', '\0']) {
        return Err(invalid("identifier must be a plain file name"));
    }
    if identifier.len() > MAX_STRING_LENGTH {
        return Err(invalid("identifier does not fit the gateway id slot"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_sizes_and_zero_fills() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw-test", 4096).unwrap();

        assert_eq!(file.len(), 4096);
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 4096);
        for offset in (0..4096).step_by(WORD_SIZE) {
            assert_eq!(file.get_u32(offset).unwrap(), 0);
        }
    }

    #[test]
    fn create_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("gwmon").join("nested");
        let file = MonitorFile::create(&nested, "gw", 128).unwrap();
        assert!(file.path().starts_with(&nested));
        assert!(file.path().exists());
    }

    #[test]
    fn stale_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gw");
        std::fs::write(&path, vec![0xAB; 256]).unwrap();

        let file = MonitorFile::create(dir.path(), "gw", 128).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
        assert_eq!(file.get_u32(0).unwrap(), 0);
    }

    #[test]
    fn words_are_little_endian() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw", 64).unwrap();
        file.put_u32(8, 0x0102_0304).unwrap();
        file.flush().unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(&bytes[8..12], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(file.load_u32(8).unwrap(), 0x0102_0304);
    }

    #[test]
    fn accesses_are_bounds_checked() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw", 64).unwrap();

        let err = file.put_u32(62, 1).unwrap_err();
        assert_eq!(err.code(), "E004");
        assert!(file.get_u32(usize::MAX - 1).is_err());
        assert!(file.value_slot(64).is_err());
        assert!(file.publish_u32(2, 1).is_err());
    }

    #[test]
    fn strings_round_trip_and_reject_oversize() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw", 2048).unwrap();

        file.put_str(0, "name", "gateway-ü").unwrap();
        assert_eq!(file.get_str(0).unwrap(), "gateway-ü");

        let long = "x".repeat(MAX_STRING_LENGTH + 1);
        let err = file.put_str(1024, "name", &long).unwrap_err();
        assert_eq!(err.code(), "E201");
        assert_eq!(file.get_u32(1024).unwrap(), 0);
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        let dir = tempdir().unwrap();
        for id in ["", ".", "..", "a/b", "a\\b"] {
            let err = MonitorFile::create(dir.path(), id, 64).unwrap_err();
            assert_eq!(err.code(), "E003", "identifier {:?}", id);
        }
    }

    #[test]
    fn removing_a_missing_file_reports_removal() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw", 128).unwrap();
        file.remove().unwrap();
        assert!(!file.path().exists());

        let err = file.remove().unwrap_err();
        assert!(matches!(err, GwmonError::FileRemove { .. }));
        assert_eq!(err.code(), "E006");
    }

    #[test]
    fn value_slots_share_the_mapping() {
        let dir = tempdir().unwrap();
        let file = MonitorFile::create(dir.path(), "gw", 128).unwrap();
        let slot = file.value_slot(64).unwrap();
        drop(file);

        slot.atomic().fetch_add(3, Ordering::Relaxed);
        assert_eq!(slot.atomic().load(Ordering::Relaxed), 3);
        assert_eq!(slot.offset(), 64);
    }
}
