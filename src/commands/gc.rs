//! GC command implementation.
//!
//! Reconstructs one log-style line per G1 collection.

use super::load_recording;
use crate::aggregator::{collect_gc_pauses, find_configuration};
use anyhow::{bail, Context, Result};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for the gc command
#[derive(Debug, Clone, Default)]
pub struct GcArgs {
    /// Recording to read
    pub file: PathBuf,

    pub keep_partial: bool,
}

/// Execute the gc command, printing to stdout
///
/// **Public** - main entry point called from main.rs
pub fn execute_gc(args: GcArgs) -> Result<()> {
    let stdout = io::stdout();
    run_gc(&args, &mut stdout.lock())
}

/// Run the gc command against any writer
///
/// # Errors
/// * No `jdk.GCConfiguration` event
/// * Young collector other than G1
/// * No collection events
pub fn run_gc(args: &GcArgs, out: &mut impl Write) -> Result<()> {
    let recording = load_recording(&args.file, args.keep_partial)?;

    let Some(config) = find_configuration(&recording).context("Failed to read GC configuration")?
    else {
        bail!("No GC configuration events");
    };
    writeln!(
        out,
        "young: {}, old: {}",
        config.young_collector, config.old_collector
    )?;
    if !config.is_g1() {
        bail!(
            "Unsupported young collector '{}': only G1 is supported",
            config.young_collector
        );
    }

    let pauses = collect_gc_pauses(&recording).context("Failed to correlate GC events")?;
    if pauses.is_empty() {
        bail!("No G1 GC events");
    }

    info!("Found {} collections", pauses.len());
    for pause in &pauses {
        writeln!(out, "{}", pause.summary_line())?;
    }
    Ok(())
}
