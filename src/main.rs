//! jfr-inspect CLI
//!
//! Inspects chunked flight recordings: constant pool statistics, pool dumps,
//! collapsed stacks for flamegraphs and a G1 collection timeline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use jfr_inspect::commands::{
    execute_dump, execute_flamegraph, execute_gc, execute_stats, DumpArgs, FlamegraphArgs, GcArgs,
    StatsArgs,
};

/// jfr-inspect - read flight recordings without a JVM
#[derive(Parser, Debug)]
#[command(name = "jfr-inspect")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Keep chunks decoded before a truncated chunk instead of failing
    #[arg(long, global = true)]
    keep_partial: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Display statistics about constant pools
    Stats {
        /// Recording file
        file: PathBuf,

        /// Also write a JSON report to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Dump every value of a constant pool
    Dump {
        /// Constant pool name, e.g. java.lang.Thread
        pool: String,

        /// Recording file
        file: PathBuf,
    },

    /// Print collapsed stacks for flamegraph tools
    Flamegraph {
        /// Recording file
        file: PathBuf,

        /// Event names to take stacks from ("all" for every event)
        #[arg(short, long = "events", value_name = "EVENT", num_args = 1..)]
        events: Vec<String>,
    },

    /// Print one line per G1 garbage collection
    Gc {
        /// Recording file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let keep_partial = cli.keep_partial;

    // Execute command
    match cli.command {
        Commands::Stats { file, json } => execute_stats(StatsArgs {
            file,
            json,
            keep_partial,
        })?,

        Commands::Dump { pool, file } => execute_dump(DumpArgs {
            pool,
            file,
            keep_partial,
        })?,

        Commands::Flamegraph { file, events } => execute_flamegraph(FlamegraphArgs {
            file,
            events,
            keep_partial,
        })?,

        Commands::Gc { file } => execute_gc(GcArgs { file, keep_partial })?,
    }

    Ok(())
}
