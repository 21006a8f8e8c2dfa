//! Recording-level views over decoded chunks.
//!
//! This module turns chunks into:
//! - A single recording with a concatenated event stream
//! - Merged constant pools and per-pool statistics
//! - Collapsed stacks (for flamegraph tools)
//! - A garbage collection timeline

pub mod gc;
pub mod pool_stats;
pub mod recording;
pub mod stack_builder;

// Re-export main types and functions
pub use gc::{collect_gc_pauses, find_configuration, GcConfiguration, GcPause, HeapUsage};
pub use pool_stats::{collect_pool_stats, to_report, total_size, PoolStats, PoolStatsReport};
pub use recording::{
    open_recording, MergedPool, PoolKey, Recording, RecordingEvents, RecordingOptions,
    RecordingStatus,
};
pub use stack_builder::{
    build_collapsed_stacks, frame_label, stack_frames, CollapsedStack, EventFilter, FoldedStacks,
};
