//! Chunk decoding.
//!
//! This module handles:
//! - Bounds-checked primitive reads and LEB128 varints
//! - Chunk headers and the self-describing type catalogue
//! - Constant pool decoding with memoized reference resolution
//! - Event records with ticks converted to nanoseconds

pub mod chunk;
pub mod constant_pool;
pub mod cursor;
pub mod event;
pub mod header;
pub mod metadata;
pub(crate) mod raw;
pub mod time;
pub mod value;

// Re-export main types
pub use chunk::{Chunk, ChunkEvents};
pub use constant_pool::{ConstantPool, ConstantPools, PoolCounts};
pub use cursor::ByteCursor;
pub use event::{Event, EventKind};
pub use header::ChunkHeader;
pub use metadata::{FieldDescriptor, Metadata, PrimitiveKind, TypeKind, TypeMetadata};
pub use time::TimeConverter;
pub use value::{Object, Value};
