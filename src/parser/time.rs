//! Tick to wall-clock conversion.

use super::header::ChunkHeader;
use crate::utils::config::NANOS_PER_SECOND;

/// Converts chunk-local ticks to nanoseconds using the chunk calibration
///
/// `convert_timestamp(t) = startNanos + (t - startTicks) / (ticksPerSecond / 1e9)`,
/// truncated toward zero. Sub-tick rounding error is not corrected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConverter {
    start_ticks: u64,
    start_nanos: u64,
    divisor: f64,
}

impl TimeConverter {
    /// Header validation guarantees a positive tick rate.
    pub fn new(header: &ChunkHeader) -> Self {
        Self {
            start_ticks: header.start_ticks,
            start_nanos: header.start_time_nanos,
            divisor: header.ticks_per_second as f64 / NANOS_PER_SECOND,
        }
    }

    /// Absolute nanoseconds since the epoch for a tick count
    pub fn convert_timestamp(&self, ticks: u64) -> i64 {
        let delta = ticks as i128 - self.start_ticks as i128;
        let nanos = self.start_nanos as i128 + (delta as f64 / self.divisor) as i128;
        clamp_i64(nanos)
    }

    /// Nanoseconds spanned by a tick count
    pub fn convert_timespan(&self, ticks: u64) -> i64 {
        clamp_i64((ticks as f64 / self.divisor) as i128)
    }
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
