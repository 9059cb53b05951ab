//! Fixed constants of the monitor file format.
//!
//! Offsets ending in `_FIELD` are the byte positions of header words and
//! slots; everything else is a size.

/// Current monitor file format version. Readers refuse any other value.
pub const MONITOR_VERSION: u32 = 1;

/// Size of one metadata word (little-endian `u32`).
pub const WORD_SIZE: usize = 4;

/// Size of a fixed-width string slot: a length word followed by UTF-8 bytes.
pub const STRING_SLOT_SIZE: usize = 1024;

/// Longest string payload that fits in a slot.
pub const MAX_STRING_LENGTH: usize = STRING_SLOT_SIZE - WORD_SIZE;

/// Alignment of the end of the metadata region.
pub const CACHE_LINE_LENGTH: usize = 64;

/// Number of plain words in the fixed header (version, two forward
/// references, four gateway region words, service count).
pub const FIXED_HEADER_WORDS: usize = 8;

/// Words per service: one reserved descriptor word plus a reference quad.
pub const PER_SERVICE_WORDS: usize = 5;

/// Words in one reference quad.
pub const REFERENCE_QUAD_WORDS: usize = 4;

/// Bytes in one reference quad.
pub const REFERENCE_QUAD_SIZE: usize = REFERENCE_QUAD_WORDS * WORD_SIZE;

/// Format version word.
pub const VERSION_FIELD: usize = 0;
/// Forward reference to the gateway data block.
pub const GATEWAY_DATA_REFERENCE_FIELD: usize = VERSION_FIELD + WORD_SIZE;
/// Forward reference to the service data block.
pub const SERVICE_DATA_REFERENCE_FIELD: usize = GATEWAY_DATA_REFERENCE_FIELD + WORD_SIZE;

/// Gateway identifier string slot.
pub const GATEWAY_ID_FIELD: usize = SERVICE_DATA_REFERENCE_FIELD + WORD_SIZE;
/// Gateway labels buffer offset (0 until published).
pub const GATEWAY_LABELS_OFFSET_FIELD: usize = GATEWAY_ID_FIELD + STRING_SLOT_SIZE;
/// Gateway labels buffer length.
pub const GATEWAY_LABELS_LENGTH_FIELD: usize = GATEWAY_LABELS_OFFSET_FIELD + WORD_SIZE;
/// Gateway values buffer offset (0 until published).
pub const GATEWAY_VALUES_OFFSET_FIELD: usize = GATEWAY_LABELS_LENGTH_FIELD + WORD_SIZE;
/// Gateway values buffer length.
pub const GATEWAY_VALUES_LENGTH_FIELD: usize = GATEWAY_VALUES_OFFSET_FIELD + WORD_SIZE;

/// Number of monitored services.
pub const SERVICE_COUNT_FIELD: usize = GATEWAY_VALUES_LENGTH_FIELD + WORD_SIZE;

/// Start of the per-service descriptor table.
pub const SERVICE_TABLE_FIELD: usize = SERVICE_COUNT_FIELD + WORD_SIZE;

/// One descriptor table entry: name slot plus reserved word.
pub const SERVICE_ENTRY_SIZE: usize = STRING_SLOT_SIZE + WORD_SIZE;

/// Where the gateway-data forward reference points.
pub const GATEWAY_DATA_FIELD: usize = GATEWAY_ID_FIELD;

/// Where the service-data forward reference points.
pub const SERVICE_DATA_FIELD: usize = SERVICE_COUNT_FIELD;

/// Labels offset word in a quad (0 until published).
pub const QUAD_LABELS_OFFSET: usize = 0;
/// Labels length word in a quad.
pub const QUAD_LABELS_LENGTH: usize = WORD_SIZE;
/// Values offset word in a quad.
pub const QUAD_VALUES_OFFSET: usize = 2 * WORD_SIZE;
/// Values length word in a quad.
pub const QUAD_VALUES_LENGTH: usize = 3 * WORD_SIZE;

/// Size of the gateway counter values buffer.
pub const GATEWAY_VALUES_BUFFER_LENGTH: u32 = 1024 * 1024;
/// Size of the gateway counter labels buffer.
pub const GATEWAY_LABELS_BUFFER_LENGTH: u32 = 32 * GATEWAY_VALUES_BUFFER_LENGTH;
/// Size of each service's counter values buffer.
pub const SERVICE_VALUES_BUFFER_LENGTH: u32 = 1024 * 1024;
/// Size of each service's counter labels buffer.
pub const SERVICE_LABELS_BUFFER_LENGTH: u32 = 32 * SERVICE_VALUES_BUFFER_LENGTH;

/// Bytes per counter value slot.
pub const VALUE_SLOT_LENGTH: usize = 8;

/// Bytes per counter label record: a length word and the label text.
pub const LABEL_RECORD_LENGTH: usize = 256;

/// Longest label that fits in a record.
pub const MAX_LABEL_LENGTH: usize = LABEL_RECORD_LENGTH - WORD_SIZE;

/// Round `value` up to the next multiple of `alignment` (a power of two).
#[must_use]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}
