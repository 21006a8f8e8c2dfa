//! Constant pool statistics per pool name.
//!
//! Counts are summed over chunks. Sizes are the exact byte spans the pool
//! entries occupy in each chunk's constant-pool section.

use super::recording::Recording;
use crate::utils::config::REPORT_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};

/// One row of the statistics table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Pool (type) name, stable across chunks
    pub name: String,

    /// Encoded bytes of the entries, summed over chunks
    pub size_bytes: u64,

    /// Number of entries
    pub count: usize,

    /// Structurally distinct entries, counted per chunk
    pub distinct: usize,
}

impl PoolStats {
    /// Whether some entries repeat a value already in the pool
    pub fn has_duplicates(&self) -> bool {
        self.distinct != self.count
    }
}

/// Versioned statistics report written by `stats --json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatsReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Recording the statistics were taken from
    pub recording: String,

    /// How the chunk sequence ended
    pub status: String,

    pub chunks: usize,
    pub events: usize,

    /// Rows sorted by count, largest first
    pub pools: Vec<PoolStats>,

    pub total_size_bytes: u64,

    /// Timestamp when the report was generated
    pub generated_at: String,
}

/// Collect one row per pool name
///
/// **Public** - feeds the `stats` command and its JSON report
///
/// # Returns
/// Rows sorted by count descending, ties by name
pub fn collect_pool_stats(recording: &Recording) -> Vec<PoolStats> {
    let mut rows: Vec<PoolStats> = recording
        .pool_counts()
        .into_iter()
        .map(|(name, counts)| PoolStats {
            name,
            size_bytes: counts.encoded_bytes,
            count: counts.count,
            distinct: counts.distinct,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    rows
}

pub fn total_size(rows: &[PoolStats]) -> u64 {
    rows.iter().map(|r| r.size_bytes).sum()
}

/// Build the serializable report for a recording
///
/// **Public** - used by the `stats` command
pub fn to_report(recording: &Recording, recording_name: &str) -> PoolStatsReport {
    use chrono::Utc;

    let pools = collect_pool_stats(recording);
    PoolStatsReport {
        version: REPORT_SCHEMA_VERSION.to_string(),
        recording: recording_name.to_string(),
        status: recording.status().label().to_string(),
        chunks: recording.chunks().len(),
        events: recording.event_count(),
        total_size_bytes: total_size(&pools),
        pools,
        generated_at: Utc::now().to_rfc3339(),
    }
}
