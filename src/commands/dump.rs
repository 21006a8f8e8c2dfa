//! Dump command implementation.
//!
//! Prints every value of one constant pool, chunk by chunk.

use super::load_recording;
use anyhow::{bail, Result};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for the dump command
#[derive(Debug, Clone, Default)]
pub struct DumpArgs {
    /// Pool name, e.g. `java.lang.Thread`
    pub pool: String,

    /// Recording to read
    pub file: PathBuf,

    pub keep_partial: bool,
}

/// Execute the dump command, printing to stdout
///
/// **Public** - main entry point called from main.rs
pub fn execute_dump(args: DumpArgs) -> Result<()> {
    if args.pool.trim().is_empty() {
        bail!("Pool name must not be empty");
    }
    let stdout = io::stdout();
    run_dump(&args, &mut stdout.lock())
}

/// Run the dump command against any writer
///
/// # Errors
/// * No pool with the given name in any chunk
pub fn run_dump(args: &DumpArgs, out: &mut impl Write) -> Result<()> {
    let recording = load_recording(&args.file, args.keep_partial)?;
    let pools = recording.constant_pools();

    let Some(pool) = pools.get(&args.pool) else {
        bail!("No constant pool named '{}'", args.pool);
    };

    info!("Dumping {} entries of {}", pool.len(), pool.name());
    for (_, value) in pool.iter() {
        writeln!(out, "{}", value)?;
    }
    Ok(())
}
