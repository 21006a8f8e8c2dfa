//! Garbage collection timeline.
//!
//! Several event kinds describe one collection; they share a `gcId`. The
//! collection event gives cause, start and pause, the G1 event gives the
//! young/mixed type and the heap summaries give usage before and after.

use super::recording::Recording;
use crate::parser::{Event, EventKind, Value};
use crate::utils::error::RecordingError;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::BTreeMap;

/// Young collector name reported by G1
pub const G1_YOUNG_COLLECTOR: &str = "G1New";

const BEFORE_GC: &str = "Before GC";

/// Collectors in use, from the first configuration event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfiguration {
    pub young_collector: String,
    pub old_collector: String,
}

impl GcConfiguration {
    pub fn is_g1(&self) -> bool {
        self.young_collector == G1_YOUNG_COLLECTOR
    }
}

/// Heap occupancy at one point of a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapUsage {
    pub used: Option<u64>,
    pub committed: Option<u64>,
}

/// Everything known about one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcPause {
    pub gc_id: u64,
    pub start_nanos: Option<i64>,
    pub cause: Option<String>,
    /// G1 collection type; mixed collections carry none
    pub kind: Option<String>,
    pub duration_nanos: Option<i64>,
    pub heap_before: HeapUsage,
    pub heap_after: HeapUsage,
    pub eden_before: Option<u64>,
    pub eden_after: Option<u64>,
    pub survivor_before: Option<u64>,
    pub survivor_after: Option<u64>,
}

impl GcPause {
    fn new(gc_id: u64) -> Self {
        Self {
            gc_id,
            ..Self::default()
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let nanos = self.start_nanos?;
        DateTime::from_timestamp(nanos.div_euclid(1_000_000_000), nanos.rem_euclid(1_000_000_000) as u32)
    }

    pub fn pause_seconds(&self) -> Option<f64> {
        self.duration_nanos.map(|n| n as f64 / 1e9)
    }

    /// One-line summary in the style of a GC log
    ///
    /// `time: [GC(id) (cause) (type), secs secs] [Heap: usedK(committedK)->usedK(committedK)]`
    pub fn summary_line(&self) -> String {
        let time = self
            .start_time()
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| "?".to_string());
        let pause = self
            .pause_seconds()
            .map(|s| format!("{:.6}", s))
            .unwrap_or_else(|| "?".to_string());
        format!(
            "{}: [GC({}) ({}) ({}), {} secs] [Heap: {}({})->{}({})]",
            time,
            self.gc_id,
            self.cause.as_deref().unwrap_or("unknown"),
            self.kind.as_deref().unwrap_or("Mixed"),
            pause,
            kib(self.heap_before.used),
            kib(self.heap_before.committed),
            kib(self.heap_after.used),
            kib(self.heap_after.committed),
        )
    }

    fn record(&mut self, event: &Event) {
        let before = event
            .get("when")
            .and_then(Value::text)
            .is_some_and(|w| w == BEFORE_GC);

        match event.kind() {
            EventKind::GarbageCollection => {
                self.start_nanos = Some(event.start_nanos());
                self.duration_nanos = event.duration_nanos();
                self.cause = text_field(event, "cause");
            }
            EventKind::G1GarbageCollection => {
                self.kind = text_field(event, "type");
            }
            EventKind::HeapSummary => {
                let usage = HeapUsage {
                    used: u64_field(event.get("heapUsed")),
                    committed: u64_field(
                        event.get("heapSpace").and_then(|s| s.get("committedSize")),
                    ),
                };
                if before {
                    self.heap_before = usage;
                } else {
                    self.heap_after = usage;
                }
            }
            EventKind::G1HeapSummary => {
                let eden = u64_field(event.get("edenUsedSize"));
                let survivor = u64_field(event.get("survivorUsedSize"));
                if before {
                    self.eden_before = eden;
                    self.survivor_before = survivor;
                } else {
                    self.eden_after = eden;
                    self.survivor_after = survivor;
                }
            }
            _ => return,
        }

        if self.start_nanos.is_none() {
            self.start_nanos = Some(event.start_nanos());
        }
    }
}

fn kib(bytes: Option<u64>) -> String {
    bytes
        .map(|b| format!("{}K", b / 1024))
        .unwrap_or_else(|| "?".to_string())
}

fn text_field(event: &Event, name: &str) -> Option<String> {
    event.get(name).and_then(Value::text).map(str::to_string)
}

fn u64_field(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_i64).map(|v| v as u64)
}

/// Collector names from the first configuration event
///
/// **Public** - `None` when the recording has no configuration event
///
/// # Errors
/// * `RecordingError::Chunk` - an event failed to decode
pub fn find_configuration(recording: &Recording) -> Result<Option<GcConfiguration>, RecordingError> {
    for event in recording.events() {
        let event = event?;
        if event.kind() == EventKind::GcConfiguration {
            return Ok(Some(GcConfiguration {
                young_collector: text_field(&event, "youngCollector").unwrap_or_default(),
                old_collector: text_field(&event, "oldCollector").unwrap_or_default(),
            }));
        }
    }
    Ok(None)
}

/// Correlate collection events by `gcId`
///
/// **Public** - main entry point for the GC timeline
///
/// # Returns
/// One entry per collection, ordered by gc id
///
/// # Errors
/// * `RecordingError::Chunk` - an event failed to decode
pub fn collect_gc_pauses(recording: &Recording) -> Result<Vec<GcPause>, RecordingError> {
    let mut pauses: BTreeMap<u64, GcPause> = BTreeMap::new();

    for event in recording.events() {
        let event = event?;
        if !matches!(
            event.kind(),
            EventKind::GarbageCollection
                | EventKind::G1GarbageCollection
                | EventKind::HeapSummary
                | EventKind::G1HeapSummary
        ) {
            continue;
        }
        let Some(gc_id) = event.get("gcId").and_then(Value::as_i64) else {
            debug!("Skipping {} without gcId at {}", event.type_name(), event.offset());
            continue;
        };
        let gc_id = gc_id as u64;
        pauses
            .entry(gc_id)
            .or_insert_with(|| GcPause::new(gc_id))
            .record(&event);
    }

    debug!("Correlated {} collections", pauses.len());
    Ok(pauses.into_values().collect())
}
