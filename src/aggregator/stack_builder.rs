//! Build collapsed stack format from recorded stack traces.
//!
//! Collapsed stacks are the input format for flamegraph tools.
//! Format: "root;caller;leaf count"
//!
//! Example: "java.lang.Thread.run;com.example.Worker.loop 12"
//! This means: 12 selected events sampled `Worker.loop` called from `Thread.run`.

use super::recording::Recording;
use crate::parser::{Event, Value};
use crate::utils::config::DEFAULT_FLAMEGRAPH_EVENTS;
use crate::utils::error::RecordingError;
use log::debug;
use std::collections::HashMap;

const UNKNOWN_TYPE: &str = "UnknownType";
const UNKNOWN_METHOD: &str = "unknown";

/// A single collapsed stack entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedStack {
    /// Frames root-first, joined by semicolons
    pub stack: String,

    /// Number of events with this stack
    pub weight: u64,
}

impl CollapsedStack {
    pub fn new(stack: String, weight: u64) -> Self {
        Self { stack, weight }
    }

    /// Folded line as consumed by flamegraph tools
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Which events contribute stacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Names(Vec<String>),
}

impl EventFilter {
    /// Filter from `-e` arguments
    ///
    /// No names selects the default events; a leading `all` selects everything.
    pub fn from_names(names: &[String]) -> Self {
        match names.first().map(String::as_str) {
            None => EventFilter::Names(
                DEFAULT_FLAMEGRAPH_EVENTS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            Some("all") => EventFilter::All,
            Some(_) => EventFilter::Names(names.to_vec()),
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Names(names) => names.iter().any(|n| n == event.type_name()),
        }
    }
}

/// Folded stacks plus how many events were selected
#[derive(Debug, Clone, Default)]
pub struct FoldedStacks {
    pub stacks: Vec<CollapsedStack>,

    /// Selected events, including those without a stack trace
    pub matched_events: usize,
}

/// `Class.method` label of one stack frame
///
/// **Public** - frame labels follow `frame.method.type.name` and
/// `frame.method.name`; missing parts become `UnknownType` / `unknown`
pub fn frame_label(frame: &Value) -> String {
    let method = frame.get("method").filter(|m| !m.is_absent());
    let class = method
        .and_then(|m| m.get("type"))
        .and_then(|t| t.get("name"))
        .and_then(Value::text)
        .map(|name| name.replace('/', "."));
    let name = method.and_then(|m| m.get("name")).and_then(Value::text);

    format!(
        "{}.{}",
        class.as_deref().unwrap_or(UNKNOWN_TYPE),
        name.unwrap_or(UNKNOWN_METHOD)
    )
}

/// Root-first frame labels of an event's `stackTrace` field
///
/// **Public** - `None` when the event has no stack trace
pub fn stack_frames(event: &Event) -> Option<Vec<String>> {
    let frames = event
        .get("stackTrace")
        .filter(|s| !s.is_absent())?
        .get("frames")?
        .as_array()?;
    // Recorded leaf-first
    Some(frames.iter().rev().map(frame_label).collect())
}

/// Build collapsed stacks from the selected events of a recording
///
/// **Public** - main entry point for stack building
///
/// # Arguments
/// * `recording` - Decoded recording
/// * `filter` - Events to take stacks from
///
/// # Returns
/// Unique stacks sorted by weight (descending), ties by stack
///
/// # Errors
/// * `RecordingError::Chunk` - an event failed to decode
pub fn build_collapsed_stacks(
    recording: &Recording,
    filter: &EventFilter,
) -> Result<FoldedStacks, RecordingError> {
    let mut stack_map: HashMap<String, u64> = HashMap::new();
    let mut matched_events = 0;

    for event in recording.events() {
        let event = event?;
        if !filter.matches(&event) {
            continue;
        }
        matched_events += 1;
        if let Some(frames) = stack_frames(&event) {
            *stack_map.entry(frames.join(";")).or_insert(0) += 1;
        }
    }

    let mut stacks: Vec<CollapsedStack> = stack_map
        .into_iter()
        .map(|(stack, weight)| CollapsedStack::new(stack, weight))
        .collect();
    stacks.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.stack.cmp(&b.stack)));

    debug!(
        "Built {} unique collapsed stacks from {} events",
        stacks.len(),
        matched_events
    );

    Ok(FoldedStacks {
        stacks,
        matched_events,
    })
}
