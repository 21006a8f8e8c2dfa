//! jfr-inspect
//!
//! Decoder for chunked, self-describing flight recordings.
//!
//! A recording is a sequence of chunks. Each chunk carries its own type
//! catalogue, constant pools and events, so ids are only meaningful inside
//! the chunk that declared them. [`Recording`] reads every chunk, resolves
//! pooled references into shared values and exposes a single event stream.
//!
//! ## Getting Started
//!
//! ```no_run
//! use jfr_inspect::Recording;
//!
//! let recording = Recording::open("profile.jfr")?;
//! for event in recording.events() {
//!     let event = event?;
//!     println!("{} at {}", event.type_name(), event.start_nanos());
//! }
//! # Ok::<(), jfr_inspect::RecordingError>(())
//! ```
//!
//! The `jfr-inspect` binary builds statistics, pool dumps, folded stacks and
//! a GC timeline on top of this API.

pub mod aggregator;
pub mod commands;
pub mod output;
pub mod parser;
pub mod utils;

pub use aggregator::{open_recording, MergedPool, PoolKey, Recording, RecordingOptions, RecordingStatus};
pub use parser::{Chunk, ChunkHeader, Event, EventKind, Value};
pub use utils::error::{DecodeError, FormatError, RecordingError, Section};
