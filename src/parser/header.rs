//! Chunk preamble.
//!
//! Layout (big-endian):
//! `magic:4 | major:u16 | minor:u16 | chunkSize:u64 | constantPoolOffset:u64 |
//! metadataOffset:u64 | startTimeNanos:u64 | durationNanos:u64 |
//! startTicks:u64 | ticksPerSecond:u64 | flags:u32`

use super::cursor::ByteCursor;
use crate::utils::config::{FLAG_CHUNK_COMPLETE, HEADER_SIZE, MAGIC, SUPPORTED_MAJOR_VERSIONS};
use crate::utils::error::{DecodeError, FormatError};
use log::debug;

/// Fixed preamble of one chunk
///
/// Section offsets are relative to the start of the chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub chunk_size: u64,
    pub constant_pool_offset: u64,
    pub metadata_offset: u64,
    pub start_time_nanos: u64,
    pub duration_nanos: u64,
    pub start_ticks: u64,
    pub ticks_per_second: u64,
    pub flags: u32,
}

impl ChunkHeader {
    /// Read and validate a header at the cursor position
    ///
    /// **Public** - first step of every chunk decode
    ///
    /// # Errors
    /// * `FormatError::BadMagic` - not a chunk boundary
    /// * `FormatError::UnsupportedVersion` - major version not understood
    /// * `FormatError::InvalidTickFrequency` - zero or negative tick rate
    /// * `FormatError::OffsetOutOfRange` / `SectionOrder` - unusable section offsets
    /// * `DecodeError::Truncation` - fewer than 68 bytes available
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let start = cursor.absolute_position();

        let mut magic = [0u8; 4];
        magic.copy_from_slice(cursor.read_bytes(4)?);
        if magic != MAGIC {
            return Err(DecodeError::format(start, FormatError::BadMagic(magic)));
        }

        let version_major = cursor.read_u16()?;
        let version_minor = cursor.read_u16()?;
        if !SUPPORTED_MAJOR_VERSIONS.contains(&version_major) {
            return Err(DecodeError::format(
                start + 4,
                FormatError::UnsupportedVersion {
                    major: version_major,
                    minor: version_minor,
                },
            ));
        }

        let header = ChunkHeader {
            version_major,
            version_minor,
            chunk_size: cursor.read_u64()?,
            constant_pool_offset: cursor.read_u64()?,
            metadata_offset: cursor.read_u64()?,
            start_time_nanos: cursor.read_u64()?,
            duration_nanos: cursor.read_u64()?,
            start_ticks: cursor.read_u64()?,
            ticks_per_second: cursor.read_u64()?,
            flags: cursor.read_u32()?,
        };

        header
            .validate()
            .map_err(|kind| DecodeError::format(start, kind))?;

        debug!(
            "Chunk header v{}.{}: {} bytes, metadata at {}, constant pools at {}, {} ticks/s",
            header.version_major,
            header.version_minor,
            header.chunk_size,
            header.metadata_offset,
            header.constant_pool_offset,
            header.ticks_per_second
        );

        Ok(header)
    }

    fn validate(&self) -> Result<(), FormatError> {
        if self.ticks_per_second == 0 || self.ticks_per_second > i64::MAX as u64 {
            return Err(FormatError::InvalidTickFrequency(self.ticks_per_second));
        }
        if self.chunk_size < HEADER_SIZE as u64 {
            return Err(FormatError::ChunkTooSmall(self.chunk_size));
        }

        let body = HEADER_SIZE as u64..self.chunk_size;
        for (section, offset) in [
            ("metadata", self.metadata_offset),
            ("constant pool", self.constant_pool_offset),
        ] {
            if !body.contains(&offset) {
                return Err(FormatError::OffsetOutOfRange {
                    section,
                    offset,
                    chunk_size: self.chunk_size,
                });
            }
        }

        if self.metadata_offset >= self.constant_pool_offset {
            return Err(FormatError::SectionOrder {
                metadata_offset: self.metadata_offset,
                constant_pool_offset: self.constant_pool_offset,
            });
        }

        Ok(())
    }

    /// Whether the writer marked this chunk as finished
    pub fn is_complete(&self) -> bool {
        self.flags & FLAG_CHUNK_COMPLETE != 0
    }
}
