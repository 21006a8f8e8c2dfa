//! Stats command implementation.
//!
//! Prints one line per constant pool name: encoded size, entry count and,
//! when some entries repeat, the distinct count.

use super::{format_thousands, load_recording};
use crate::aggregator::{collect_pool_stats, to_report, total_size, PoolStats};
use crate::output::write_report;
use anyhow::{bail, Context, Result};
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for the stats command
#[derive(Debug, Clone, Default)]
pub struct StatsArgs {
    /// Recording to read
    pub file: PathBuf,

    /// Also write a JSON report here
    pub json: Option<PathBuf>,

    /// Keep chunks decoded before a truncation
    pub keep_partial: bool,
}

/// Execute the stats command, printing to stdout
///
/// **Public** - main entry point called from main.rs
pub fn execute_stats(args: StatsArgs) -> Result<()> {
    validate_args(&args)?;
    let stdout = io::stdout();
    run_stats(&args, &mut stdout.lock())
}

/// Run the stats command against any writer
///
/// **Public** - used by `execute_stats` and tests
pub fn run_stats(args: &StatsArgs, out: &mut impl Write) -> Result<()> {
    let recording = load_recording(&args.file, args.keep_partial)?;
    let rows = collect_pool_stats(&recording);

    write_table(&rows, out).context("Failed to write statistics")?;

    if let Some(json_path) = &args.json {
        let report = to_report(&recording, &args.file.display().to_string());
        write_report(&report, json_path).context("Failed to write JSON report")?;
        info!("Report written to {}", json_path.display());
    }

    Ok(())
}

/// Print the statistics table
///
/// **Private** - the distinct column stays blank when every entry is distinct
fn write_table(rows: &[PoolStats], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Constant pool name size(B) count distinct")?;
    for row in rows {
        let distinct = if row.has_duplicates() {
            format_thousands(row.distinct as u64)
        } else {
            String::new()
        };
        let line = format!(
            "{} {} {} {}",
            row.name,
            format_thousands(row.size_bytes),
            format_thousands(row.count as u64),
            distinct
        );
        writeln!(out, "{}", line.trim_end())?;
    }
    writeln!(out, "Total pools size: {}", format_thousands(total_size(rows)))
}

/// Validate stats arguments
///
/// **Public** - called before execution
pub fn validate_args(args: &StatsArgs) -> Result<()> {
    if let Some(json) = &args.json {
        if json.extension().and_then(|e| e.to_str()) != Some("json") {
            bail!("JSON report path must end in .json: {}", json.display());
        }
    }
    Ok(())
}
