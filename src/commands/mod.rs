//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands open the recording, run one aggregator view and print it.

pub mod dump;
pub mod flamegraph;
pub mod gc;
pub mod stats;

// Re-export main command functions
pub use dump::{execute_dump, DumpArgs};
pub use flamegraph::{execute_flamegraph, FlamegraphArgs};
pub use gc::{execute_gc, GcArgs};
pub use stats::{execute_stats, StatsArgs};

use crate::aggregator::{Recording, RecordingOptions, RecordingStatus};
use anyhow::{bail, Context, Result};
use log::warn;
use std::path::Path;

/// Open a recording for a command, reporting partial outcomes
///
/// **Public** - shared by every command
///
/// # Errors
/// * Missing or unreadable file
/// * Any chunk decode failure not covered by `keep_partial`
pub fn load_recording(path: &Path, keep_partial: bool) -> Result<Recording> {
    if !path.is_file() {
        bail!("Recording not found: {}", path.display());
    }

    let recording = Recording::open_with(path, RecordingOptions { keep_partial })
        .with_context(|| format!("Failed to decode recording {}", path.display()))?;

    match recording.status() {
        RecordingStatus::Complete => {}
        RecordingStatus::Incomplete { decoded_chunks } => {
            warn!(
                "Recording is still being written; using {} complete chunks",
                decoded_chunks
            );
        }
        RecordingStatus::Truncated {
            decoded_chunks,
            error,
        } => {
            warn!(
                "Recording is truncated; using {} chunks ({})",
                decoded_chunks, error
            );
        }
    }

    Ok(recording)
}

/// Group digits in thousands: `1234567` -> `1,234,567`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
