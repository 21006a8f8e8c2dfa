//! Format constants and defaults shared by the decoder and the CLI.

/// Magic bytes opening every chunk
pub const MAGIC: [u8; 4] = *b"FLR\0";

/// Fixed size of the chunk preamble in bytes
pub const HEADER_SIZE: usize = 68;

/// Major format versions this decoder understands
pub const SUPPORTED_MAJOR_VERSIONS: &[u16] = &[1, 2];

/// Header flag: the writer finished this chunk
pub const FLAG_CHUNK_COMPLETE: u32 = 0x1;

// Field descriptor flag bits in the metadata section
pub const FIELD_FLAG_ARRAY: u8 = 0x1;
pub const FIELD_FLAG_CONSTANT_POOL: u8 = 0x2;
pub const FIELD_FLAG_NULLABLE: u8 = 0x4;

// String value encodings
pub const STRING_ENCODING_NULL: u8 = 0;
pub const STRING_ENCODING_EMPTY: u8 = 1;
pub const STRING_ENCODING_CONSTANT_POOL: u8 = 2;
pub const STRING_ENCODING_UTF8: u8 = 3;
pub const STRING_ENCODING_CHAR_ARRAY: u8 = 4;
pub const STRING_ENCODING_LATIN1: u8 = 5;

/// Deepest chain of composites a single value may embed inline
///
/// Array fields let a type contain itself, so only this bound stops
/// a few length bytes from describing an arbitrarily deep value.
pub const MAX_NESTING_DEPTH: usize = 64;

pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Name of the leading tick-valued field of every event type
pub const START_TIME_FIELD: &str = "startTime";

/// Name of the optional second tick-valued field of an event type
pub const DURATION_FIELD: &str = "duration";

/// Event types folded by the flamegraph command when none are given
pub const DEFAULT_FLAMEGRAPH_EVENTS: &[&str] = &["jdk.ExecutionSample"];

/// Current stats report schema version
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";
