// crates/outreach-gate-server/src/log.rs
// ============================================================================
// Module: Structured Log Events
// Description: JSON-line structured event emission through a sink trait.
// Purpose: Keep operator-readable logs consistent and machine-parseable.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Every noteworthy action emits one JSON object with an `event` name, an
//! optional `request_id`, and flat fields. Keys serialize sorted (the JSON
//! map is BTree-backed) so log diffs stay stable. Sinks are pluggable: the
//! process uses stderr, tests capture events in memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Destination for structured log events.
pub trait LogSink: Send + Sync {
    /// Records one event object.
    fn record(&self, event: &Value);
}

/// Sink that writes JSON lines to stderr.
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    #[allow(clippy::print_stderr, reason = "Stderr is the process log destination.")]
    fn record(&self, event: &Value) {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
    }
}

/// Sink that discards events.
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn record(&self, _event: &Value) {}
}

// ============================================================================
// SECTION: Emission Helper
// ============================================================================

/// Builds and records one structured event.
pub fn log_event(
    sink: &dyn LogSink,
    event: &str,
    request_id: Option<&str>,
    fields: &[(&str, Value)],
) {
    let mut map = Map::new();
    map.insert("event".to_string(), Value::String(event.to_string()));
    if let Some(request_id) = request_id {
        map.insert("request_id".to_string(), Value::String(request_id.to_string()));
    }
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    sink.record(&Value::Object(map));
}
