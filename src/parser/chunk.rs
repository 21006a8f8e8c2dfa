//! One self-contained chunk of a recording.

use super::constant_pool::{ConstantPools, PoolCounts};
use super::cursor::ByteCursor;
use super::event::{decode_event, Event};
use super::header::ChunkHeader;
use super::metadata::Metadata;
use super::time::TimeConverter;
use crate::utils::error::DecodeError;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

/// A decoded chunk: header, type catalogue, resolved pools and the
/// location of its event section
///
/// Type ids and pool local ids are only meaningful within the chunk.
#[derive(Debug)]
pub struct Chunk {
    index: usize,
    header: ChunkHeader,
    metadata: Metadata,
    pools: ConstantPools,
    time: TimeConverter,
    data: Arc<[u8]>,
    range: Range<usize>,
    events_start: usize,
    event_count: usize,
}

/// Sections of a chunk that decoded cleanly
pub(crate) struct ChunkParts {
    pub(crate) header: ChunkHeader,
    pub(crate) metadata: Metadata,
    pub(crate) pools: ConstantPools,
    /// Event section start, relative to the chunk
    pub(crate) events_start: usize,
    pub(crate) event_count: usize,
}

impl Chunk {
    pub(crate) fn new(index: usize, data: Arc<[u8]>, range: Range<usize>, parts: ChunkParts) -> Self {
        Self {
            index,
            time: TimeConverter::new(&parts.header),
            header: parts.header,
            metadata: parts.metadata,
            pools: parts.pools,
            data,
            range,
            events_start: parts.events_start,
            event_count: parts.event_count,
        }
    }

    /// Position of the chunk in the recording, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    /// Absolute byte offset of the chunk header
    pub fn offset(&self) -> u64 {
        self.range.start as u64
    }

    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn constant_pools(&self) -> &ConstantPools {
        &self.pools
    }

    pub fn time_converter(&self) -> &TimeConverter {
        &self.time
    }

    /// Number of event records in the chunk
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Entry and distinct-value counts per pool name
    pub fn pool_entry_counts(&self) -> BTreeMap<String, PoolCounts> {
        self.pools.entry_counts()
    }

    /// Decode the event section from its start
    ///
    /// **Public** - each call starts a fresh pass over the same bytes
    ///
    /// # Returns
    /// Iterator yielding events in file order; it ends after the first error
    pub fn events(&self) -> ChunkEvents<'_> {
        let start = self.range.start + self.events_start;
        ChunkEvents {
            chunk: self,
            cursor: ByteCursor::with_base(&self.data[start..self.range.end], start as u64),
            failed: false,
        }
    }
}

/// Forward-only event iterator over one chunk
pub struct ChunkEvents<'c> {
    chunk: &'c Chunk,
    cursor: ByteCursor<'c>,
    failed: bool,
}

impl Iterator for ChunkEvents<'_> {
    type Item = Result<Event, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.at_end() {
            return None;
        }
        let chunk = self.chunk;
        let result = decode_event(&mut self.cursor, &chunk.metadata, &chunk.pools, &chunk.time);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}
