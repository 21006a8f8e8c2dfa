//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Structural problems that make a chunk impossible to decode safely
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic {0:02x?}, expected \"FLR\\0\"")]
    BadMagic([u8; 4]),

    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("ticks per second must be positive, found {0}")]
    InvalidTickFrequency(u64),

    #[error("chunk size {0} is smaller than the chunk header")]
    ChunkTooSmall(u64),

    #[error("{section} offset {offset} lies outside the chunk body (chunk size {chunk_size})")]
    OffsetOutOfRange {
        section: &'static str,
        offset: u64,
        chunk_size: u64,
    },

    #[error("metadata section at {metadata_offset} must precede the constant pool section at {constant_pool_offset}")]
    SectionOrder {
        metadata_offset: u64,
        constant_pool_offset: u64,
    },

    #[error("metadata section runs past the constant pool offset {0}")]
    MetadataOverrun(u64),

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("invalid char code point {0:#x}")]
    InvalidChar(u64),

    #[error("duplicate type id {0} in metadata")]
    DuplicateType(u64),

    #[error("field '{field}' of '{owner}' references unknown type id {type_id}")]
    UnresolvedFieldType {
        owner: String,
        field: String,
        type_id: u64,
    },

    #[error("unsupported field type: {0}")]
    UnsupportedFieldType(String),

    #[error("type '{0}' embeds itself inline")]
    RecursiveInlineType(String),

    #[error("value nests composites deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("unknown type id {0}")]
    UnknownType(u64),

    #[error("unsupported string encoding {0}")]
    UnsupportedStringEncoding(u8),

    #[error("duplicate constant {pool} id {id}")]
    DuplicateConstant { pool: String, id: u64 },

    #[error("cyclic constant reference: {pool} id {id} requires itself")]
    CyclicReference { pool: String, id: u64 },

    #[error("event type '{0}' does not start with a startTime field")]
    MissingStartTime(String),

    #[error("invalid event record size {0}")]
    InvalidRecordSize(u64),

    #[error("event record of {declared} bytes overran its end by {overrun} bytes")]
    RecordOverrun { declared: u64, overrun: u64 },
}

/// Errors raised while decoding the bytes of one chunk
///
/// Offsets are absolute byte positions in the recording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("format error at byte {offset}: {kind}")]
    Format { offset: u64, kind: FormatError },

    #[error("truncated at byte {offset}: needed {needed} bytes, {available} available")]
    Truncation {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("dangling reference at byte {offset}: {pool} id {id} does not exist")]
    DanglingReference { offset: u64, pool: String, id: u64 },
}

impl DecodeError {
    pub fn format(offset: u64, kind: FormatError) -> Self {
        DecodeError::Format { offset, kind }
    }

    pub fn is_truncation(&self) -> bool {
        matches!(self, DecodeError::Truncation { .. })
    }

    /// Byte position the error was detected at
    pub fn offset(&self) -> u64 {
        match self {
            DecodeError::Format { offset, .. }
            | DecodeError::Truncation { offset, .. }
            | DecodeError::DanglingReference { offset, .. } => *offset,
        }
    }

    /// The format error kind, if this is a format error
    pub fn format_kind(&self) -> Option<&FormatError> {
        match self {
            DecodeError::Format { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Part of a chunk that was being decoded when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Metadata,
    ConstantPools,
    Events,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Header => "header",
            Section::Metadata => "metadata",
            Section::ConstantPools => "constant pools",
            Section::Events => "events",
        };
        f.write_str(name)
    }
}

/// Errors surfaced to consumers of a recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("failed to read recording {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {chunk} ({section}): {source}")]
    Chunk {
        chunk: usize,
        section: Section,
        #[source]
        source: DecodeError,
    },
}

impl RecordingError {
    /// The underlying decode error, if any
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            RecordingError::Chunk { source, .. } => Some(source),
            RecordingError::Io { .. } => None,
        }
    }

    pub fn is_truncation(&self) -> bool {
        self.decode_error().is_some_and(DecodeError::is_truncation)
    }
}

/// Attach chunk index and section to a decode result
pub trait ChunkContext<T> {
    fn in_section(self, chunk: usize, section: Section) -> Result<T, RecordingError>;
}

impl<T> ChunkContext<T> for Result<T, DecodeError> {
    fn in_section(self, chunk: usize, section: Section) -> Result<T, RecordingError> {
        self.map_err(|source| RecordingError::Chunk {
            chunk,
            section,
            source,
        })
    }
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
