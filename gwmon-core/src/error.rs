//! Error types for gwmon.
//!
//! Every error carries a stable code so log lines from the gateway and from
//! reader tools can be correlated:
//!
//! - `E0xx`: monitor file lifecycle (create, map, bounds)
//! - `E1xx`: layout planning
//! - `E2xx`: field and counter writes
//! - `E3xx`: reader side

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for gwmon operations.
#[derive(Error, Debug)]
pub enum GwmonError {
    // =========================================================================
    // Monitor File Errors (E001-E099)
    // =========================================================================
    /// Failed to create the monitor file or its directory.
    #[error("E001: Failed to create monitor file at {path}: {cause}")]
    FileCreate {
        /// The path where creation failed.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to memory-map the monitor file.
    #[error("E002: Failed to mmap monitor file at {path}: {cause}")]
    FileMmap {
        /// The path of the monitor file.
        path: PathBuf,
        /// Reason for the mmap failure.
        cause: String,
    },

    /// The gateway identifier cannot be used as a file name.
    #[error("E003: Invalid gateway identifier '{identifier}': {cause}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
        /// Why it was rejected.
        cause: String,
    },

    /// A field access fell outside the mapped file.
    #[error("E004: Access of {len} bytes at offset {offset} exceeds file length {file_len}")]
    OutOfBounds {
        /// Start of the access.
        offset: usize,
        /// Number of bytes accessed.
        len: usize,
        /// Total length of the mapping.
        file_len: usize,
    },

    /// Failed to flush the mapping.
    #[error("E005: Failed to flush monitor file at {path}: {cause}")]
    FileFlush {
        /// The path of the monitor file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to delete the monitor file.
    #[error("E006: Failed to remove monitor file at {path}: {cause}")]
    FileRemove {
        /// The path that could not be removed.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// The metadata skeleton of this file has already been written.
    #[error("E007: Monitor file at {path} already carries metadata (version {version})")]
    MetadataWritten {
        /// The path of the monitor file.
        path: PathBuf,
        /// Version word found in the file.
        version: u32,
    },

    // =========================================================================
    // Layout Errors (E100-E199)
    // =========================================================================
    /// The layout for this many services does not fit in the format's words.
    #[error("E101: Layout for {service_count} services overflows the file format: {cause}")]
    LayoutOverflow {
        /// Requested number of services.
        service_count: usize,
        /// Which quantity overflowed.
        cause: String,
    },

    /// A buffer size is not usable for counter regions.
    #[error("E102: Invalid {name} buffer length {length}: {cause}")]
    InvalidBufferSize {
        /// Which buffer was misconfigured.
        name: &'static str,
        /// The rejected length.
        length: u32,
        /// Why it was rejected.
        cause: String,
    },

    /// The number of service names does not match the planned layout.
    #[error("E103: Layout planned for {expected} services but {actual} names were given")]
    ServiceCountMismatch {
        /// Service count the layout was planned for.
        expected: usize,
        /// Number of names supplied.
        actual: usize,
    },

    /// The same service name was supplied twice.
    #[error("E104: Duplicate monitored service '{name}'")]
    DuplicateService {
        /// The duplicated name.
        name: String,
    },

    /// A service index outside `0..service_count`.
    #[error("E105: Service index {index} out of range for {service_count} services")]
    UnknownService {
        /// The rejected index.
        index: usize,
        /// Number of services in the layout.
        service_count: usize,
    },

    // =========================================================================
    // Field and Counter Errors (E200-E299)
    // =========================================================================
    /// A string does not fit its fixed-width slot.
    #[error("E201: {field} is {length} bytes, slot holds at most {max}")]
    StringTooLong {
        /// Which field was being written.
        field: String,
        /// Encoded length of the string.
        length: usize,
        /// Maximum encodable length.
        max: usize,
    },

    /// A counter label was rejected.
    #[error("E202: Invalid counter label '{label}': {cause}")]
    InvalidLabel {
        /// The rejected label.
        label: String,
        /// Why it was rejected.
        cause: String,
    },

    /// No free counter slot left in the owner's regions.
    #[error("E203: Counter capacity exhausted for {owner}: {capacity} counters allocated")]
    CounterCapacity {
        /// The owner whose regions are full.
        owner: String,
        /// Number of counter slots in the region pair.
        capacity: usize,
    },

    // =========================================================================
    // Reader Errors (E300-E399)
    // =========================================================================
    /// Failed to open a monitor file for reading.
    #[error("E301: Failed to open monitor file at {path}: {cause}")]
    FileOpen {
        /// The path that could not be opened.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// The file was written with an unsupported format version.
    #[error("E302: Unsupported monitor file version {found} (expected {expected})")]
    VersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// The requested region has not been published yet.
    #[error("E303: Regions of {owner} are not published yet")]
    NotPublished {
        /// The owner whose offsets still read zero.
        owner: String,
    },

    /// The file content is inconsistent.
    #[error("E304: Corrupt monitor file at offset {offset}: {cause}")]
    Corrupt {
        /// Offset of the inconsistent field.
        offset: usize,
        /// Description of the inconsistency.
        cause: String,
    },
}

impl GwmonError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileCreate { .. } => "E001",
            Self::FileMmap { .. } => "E002",
            Self::InvalidIdentifier { .. } => "E003",
            Self::OutOfBounds { .. } => "E004",
            Self::FileFlush { .. } => "E005",
            Self::FileRemove { .. } => "E006",
            Self::MetadataWritten { .. } => "E007",
            Self::LayoutOverflow { .. } => "E101",
            Self::InvalidBufferSize { .. } => "E102",
            Self::ServiceCountMismatch { .. } => "E103",
            Self::DuplicateService { .. } => "E104",
            Self::UnknownService { .. } => "E105",
            Self::StringTooLong { .. } => "E201",
            Self::InvalidLabel { .. } => "E202",
            Self::CounterCapacity { .. } => "E203",
            Self::FileOpen { .. } => "E301",
            Self::VersionMismatch { .. } => "E302",
            Self::NotPublished { .. } => "E303",
            Self::Corrupt { .. } => "E304",
        }
    }

    /// Check if this error comes from the host environment (directory, mapping).
    ///
    /// These are the failures the configuration layer downgrades to the
    /// no-op manager.
    #[must_use]
    pub fn is_environment_error(&self) -> bool {
        matches!(
            self,
            Self::FileCreate { .. }
                | Self::FileMmap { .. }
                | Self::FileFlush { .. }
                | Self::FileRemove { .. }
        )
    }

    /// Check if this error was raised while planning the layout, before any I/O.
    #[must_use]
    pub fn is_layout_error(&self) -> bool {
        matches!(
            self,
            Self::LayoutOverflow { .. }
                | Self::InvalidBufferSize { .. }
                | Self::ServiceCountMismatch { .. }
                | Self::DuplicateService { .. }
                | Self::UnknownService { .. }
        )
    }

    /// Check if a reader may succeed by polling again later.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::NotPublished { .. })
    }
}

/// Result type alias for gwmon operations.
pub type Result<T> = std::result::Result<T, GwmonError>;
