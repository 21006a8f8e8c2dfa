//! Flamegraph command implementation.
//!
//! Emits collapsed stacks, one `frames count` line per unique stack, ready
//! for `flamegraph.pl` or `inferno-flamegraph`.

use super::load_recording;
use crate::aggregator::{build_collapsed_stacks, EventFilter};
use anyhow::{bail, Context, Result};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for the flamegraph command
#[derive(Debug, Clone, Default)]
pub struct FlamegraphArgs {
    /// Recording to read
    pub file: PathBuf,

    /// Event type names; empty selects the default, `all` selects every event
    pub events: Vec<String>,

    pub keep_partial: bool,
}

/// Execute the flamegraph command, printing to stdout
///
/// **Public** - main entry point called from main.rs
pub fn execute_flamegraph(args: FlamegraphArgs) -> Result<()> {
    let stdout = io::stdout();
    run_flamegraph(&args, &mut stdout.lock())
}

/// Run the flamegraph command against any writer
///
/// # Errors
/// * No event matches the filter
/// * An event fails to decode
pub fn run_flamegraph(args: &FlamegraphArgs, out: &mut impl Write) -> Result<()> {
    let recording = load_recording(&args.file, args.keep_partial)?;
    let filter = EventFilter::from_names(&args.events);

    let folded = build_collapsed_stacks(&recording, &filter).context("Failed to fold stacks")?;
    if folded.matched_events == 0 {
        bail!("No events found for {:?}", filter);
    }

    info!(
        "Folded {} events into {} stacks",
        folded.matched_events,
        folded.stacks.len()
    );
    for stack in &folded.stacks {
        writeln!(out, "{}", stack.to_line())?;
    }
    Ok(())
}
