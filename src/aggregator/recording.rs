//! Multi-chunk recordings.
//!
//! Chunks are read back to back: each header sits at the end of the previous
//! chunk (`offset + chunkSize`) until the bytes run out. Every chunk keeps its
//! own id scope; the merged pool view keys entries by chunk so nothing
//! collides.

use crate::parser::chunk::{Chunk, ChunkEvents, ChunkParts};
use crate::parser::constant_pool::{ConstantPools, PoolCounts};
use crate::parser::cursor::ByteCursor;
use crate::parser::event::{scan_events, Event};
use crate::parser::header::ChunkHeader;
use crate::parser::metadata::Metadata;
use crate::parser::time::TimeConverter;
use crate::parser::value::Value;
use crate::utils::error::{ChunkContext, DecodeError, FormatError, RecordingError, Section};
use log::{debug, info, trace, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// How to treat a recording that ends badly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingOptions {
    /// Keep the chunks decoded before a truncation instead of failing
    pub keep_partial: bool,
}

/// How the chunk sequence ended
#[derive(Debug)]
pub enum RecordingStatus {
    /// Bytes ended exactly at a chunk boundary
    Complete,

    /// The last chunk is still being written and its bytes ran out
    Incomplete { decoded_chunks: usize },

    /// A chunk was cut short; only produced with `keep_partial`
    Truncated {
        decoded_chunks: usize,
        error: RecordingError,
    },
}

impl RecordingStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RecordingStatus::Complete)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordingStatus::Complete => "complete",
            RecordingStatus::Incomplete { .. } => "incomplete",
            RecordingStatus::Truncated { .. } => "truncated",
        }
    }
}

/// Position of the reader within the chunk sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    NotStarted,
    ReadingHeader,
    ReadingMetadata,
    ReadingConstantPools,
    ReadingEvents,
    ChunkComplete,
    RecordingComplete,
}

impl ReadState {
    /// Section reported when decoding fails in this state
    fn section(self) -> Section {
        match self {
            ReadState::ReadingMetadata => Section::Metadata,
            ReadState::ReadingConstantPools => Section::ConstantPools,
            ReadState::ReadingEvents => Section::Events,
            ReadState::NotStarted
            | ReadState::ReadingHeader
            | ReadState::ChunkComplete
            | ReadState::RecordingComplete => Section::Header,
        }
    }
}

enum ChunkStep {
    Decoded(Chunk),
    /// Trailing chunk flagged as in progress, bytes ran out
    InProgress,
}

struct ChunkReader {
    data: Arc<[u8]>,
    options: RecordingOptions,
    state: ReadState,
    position: usize,
    chunks: Vec<Chunk>,
}

impl ChunkReader {
    fn new(data: Arc<[u8]>, options: RecordingOptions) -> Self {
        Self {
            data,
            options,
            state: ReadState::NotStarted,
            position: 0,
            chunks: Vec::new(),
        }
    }

    fn transition(&mut self, next: ReadState) {
        trace!(
            "chunk {}: {:?} -> {:?}",
            self.chunks.len(),
            self.state,
            next
        );
        self.state = next;
    }

    fn fail<T>(&self, result: Result<T, DecodeError>) -> Result<T, RecordingError> {
        result.in_section(self.chunks.len(), self.state.section())
    }

    fn run(mut self) -> Result<Recording, RecordingError> {
        loop {
            if self.position == self.data.len() {
                self.transition(ReadState::RecordingComplete);
                return Ok(self.finish(RecordingStatus::Complete));
            }

            match self.read_chunk() {
                Ok(ChunkStep::Decoded(chunk)) => {
                    self.position += chunk.header().chunk_size as usize;
                    self.chunks.push(chunk);
                    self.transition(ReadState::ChunkComplete);
                }
                Ok(ChunkStep::InProgress) => {
                    warn!(
                        "Chunk {} is still being written; stopping after {} complete chunks",
                        self.chunks.len(),
                        self.chunks.len()
                    );
                    let decoded_chunks = self.chunks.len();
                    return Ok(self.finish(RecordingStatus::Incomplete { decoded_chunks }));
                }
                Err(error) if error.is_truncation() && self.options.keep_partial => {
                    warn!("Keeping {} chunks before truncation: {}", self.chunks.len(), error);
                    let decoded_chunks = self.chunks.len();
                    return Ok(self.finish(RecordingStatus::Truncated {
                        decoded_chunks,
                        error,
                    }));
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn finish(self, status: RecordingStatus) -> Recording {
        info!(
            "Decoded {} chunks ({} events)",
            self.chunks.len(),
            self.chunks.iter().map(Chunk::event_count).sum::<usize>()
        );
        Recording {
            chunks: self.chunks,
            status,
        }
    }

    fn read_chunk(&mut self) -> Result<ChunkStep, RecordingError> {
        let data = Arc::clone(&self.data);
        let start = self.position;
        let available = &data[start..];

        self.transition(ReadState::ReadingHeader);
        let header = self.fail(ChunkHeader::read(&mut ByteCursor::with_base(
            available,
            start as u64,
        )))?;

        if header.chunk_size > available.len() as u64 {
            if !header.is_complete() {
                return Ok(ChunkStep::InProgress);
            }
            return self.fail(Err(DecodeError::Truncation {
                offset: start as u64,
                needed: header.chunk_size,
                available: available.len() as u64,
            }));
        }

        let end = start + header.chunk_size as usize;
        let mut cursor = ByteCursor::with_base(&data[start..end], start as u64);

        self.transition(ReadState::ReadingMetadata);
        self.fail(cursor.seek(header.metadata_offset as usize))?;
        let metadata = self.fail(Metadata::read(&mut cursor))?;
        let pool_offset = header.constant_pool_offset as usize;
        if cursor.position() > pool_offset {
            return self.fail(Err(DecodeError::format(
                cursor.absolute_position(),
                FormatError::MetadataOverrun(header.constant_pool_offset),
            )));
        }

        self.transition(ReadState::ReadingConstantPools);
        self.fail(cursor.seek(pool_offset))?;
        let pools = self.fail(ConstantPools::read(&mut cursor, &metadata))?;

        self.transition(ReadState::ReadingEvents);
        let events_start = cursor.position();
        let event_count = self.fail(scan_events(
            &mut cursor,
            &metadata,
            &pools,
            &TimeConverter::new(&header),
        ))?;

        debug!(
            "Chunk {} at {}: {} types, {} pools, {} events",
            self.chunks.len(),
            start,
            metadata.len(),
            pools.len(),
            event_count
        );

        let parts = ChunkParts {
            header,
            metadata,
            pools,
            events_start,
            event_count,
        };
        Ok(ChunkStep::Decoded(Chunk::new(
            self.chunks.len(),
            Arc::clone(&self.data),
            start..end,
            parts,
        )))
    }
}

/// An ordered sequence of decoded chunks
#[derive(Debug)]
pub struct Recording {
    chunks: Vec<Chunk>,
    status: RecordingStatus,
}

impl Recording {
    /// Open a recording file with strict options
    ///
    /// **Public** - main entry point for consumers
    ///
    /// # Errors
    /// * `RecordingError::Io` - the file could not be read
    /// * `RecordingError::Chunk` - a chunk failed to decode
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        Self::open_with(path, RecordingOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: RecordingOptions) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        info!("Opening recording: {}", path.display());
        let bytes = std::fs::read(path).map_err(|source| RecordingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes_with(bytes, options)
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self, RecordingError> {
        Self::from_bytes_with(bytes, RecordingOptions::default())
    }

    /// Decode every chunk of an in-memory recording
    ///
    /// **Public** - all sections except event fields are decoded eagerly
    ///
    /// # Arguments
    /// * `bytes` - Complete recording contents
    /// * `options` - Policy for truncated recordings
    pub fn from_bytes_with(
        bytes: impl Into<Arc<[u8]>>,
        options: RecordingOptions,
    ) -> Result<Self, RecordingError> {
        ChunkReader::new(bytes.into(), options).run()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn status(&self) -> &RecordingStatus {
        &self.status
    }

    /// Total event records over all chunks
    pub fn event_count(&self) -> usize {
        self.chunks.iter().map(Chunk::event_count).sum()
    }

    /// Every event of every chunk, in chunk order
    pub fn events(&self) -> RecordingEvents<'_> {
        RecordingEvents {
            chunks: self.chunks.iter(),
            current: None,
            chunk_index: 0,
            failed: false,
        }
    }

    /// Pools of all chunks merged by pool name
    pub fn constant_pools(&self) -> BTreeMap<String, MergedPool> {
        let mut merged: BTreeMap<String, MergedPool> = BTreeMap::new();
        for chunk in &self.chunks {
            for pool in chunk.constant_pools().iter() {
                let target = merged
                    .entry(pool.name().to_string())
                    .or_insert_with(|| MergedPool::new(pool.name()));
                target.counts.add(pool.counts());
                for (local_id, value) in pool.iter() {
                    let key = PoolKey {
                        chunk: chunk.index(),
                        type_id: pool.type_id(),
                        local_id,
                    };
                    target.entries.insert(key, value.clone());
                }
            }
        }
        merged
    }

    /// Entry counts per pool name summed over chunks
    pub fn pool_counts(&self) -> BTreeMap<String, PoolCounts> {
        let mut totals: BTreeMap<String, PoolCounts> = BTreeMap::new();
        for chunk in &self.chunks {
            for (name, counts) in chunk.pool_entry_counts() {
                totals.entry(name).or_default().add(counts);
            }
        }
        totals
    }
}

/// Open a recording file with strict options
pub fn open_recording(path: impl AsRef<Path>) -> Result<Recording, RecordingError> {
    Recording::open(path)
}

/// Identity of one pooled constant across the whole recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolKey {
    pub chunk: usize,
    pub type_id: u64,
    pub local_id: u64,
}

/// All entries of one pool name over every chunk
#[derive(Debug, Clone)]
pub struct MergedPool {
    name: String,
    entries: BTreeMap<PoolKey, Value>,
    counts: PoolCounts,
}

impl MergedPool {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: BTreeMap::new(),
            counts: PoolCounts::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &PoolKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Entries in chunk order, then type id, then local id
    pub fn iter(&self) -> impl Iterator<Item = (&PoolKey, &Value)> {
        self.entries.iter()
    }

    /// Counts summed per chunk; distinct values are not deduplicated across chunks
    pub fn counts(&self) -> PoolCounts {
        self.counts
    }
}

/// Concatenated event stream of a recording
pub struct RecordingEvents<'r> {
    chunks: std::slice::Iter<'r, Chunk>,
    current: Option<ChunkEvents<'r>>,
    chunk_index: usize,
    failed: bool,
}

impl Iterator for RecordingEvents<'_> {
    type Item = Result<Event, RecordingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(events) = self.current.as_mut() {
                match events.next() {
                    Some(Ok(event)) => return Some(Ok(event)),
                    Some(Err(error)) => {
                        self.failed = true;
                        return Some(Err(error).in_section(self.chunk_index, Section::Events));
                    }
                    None => {}
                }
            }
            let chunk = self.chunks.next()?;
            self.chunk_index = chunk.index();
            self.current = Some(chunk.events());
        }
    }
}
