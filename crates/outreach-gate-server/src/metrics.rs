// crates/outreach-gate-server/src/metrics.rs
// ============================================================================
// Module: In-Process Metrics
// Description: Counter registry, snapshot persistence, export, SLO hooks.
// Purpose: Give operators reliability analytics without a metrics daemon.
// Dependencies: outreach-gate-config, outreach-gate-store-sqlite, reqwest
// ============================================================================

//! ## Overview
//! Counters live in one mutex-guarded map keyed by
//! `<name>|<sorted k=v labels>`. Persisting a snapshot is an explicit
//! operation: SLO rates are evaluated first (so threshold counters land in
//! the same snapshot), the row is written, and the snapshot is optionally
//! pushed to an external sink with a bounded timeout. Export failures are
//! logged and never fail the persist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use outreach_gate_config::ObservabilityExportSettings;
use outreach_gate_config::SloThresholds;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_store_sqlite::SqliteGatewayStore;
use serde_json::json;

use crate::log::LogSink;
use crate::log::log_event;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Process-wide counter registry.
///
/// # Invariants
/// - All mutations and snapshot reads go through the single mutex.
/// - Keys are `<name>` or `<name>|<k=v,…>` with labels sorted by key.
#[derive(Default)]
pub struct MetricsRegistry {
    /// Guarded counter map.
    counters: Mutex<BTreeMap<String, i64>>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments a labeled counter by one.
    pub fn incr(&self, name: &str, labels: &[(&str, &str)]) {
        self.incr_by(name, labels, 1);
    }

    /// Increments a labeled counter by an explicit amount.
    pub fn incr_by(&self, name: &str, labels: &[(&str, &str)], amount: i64) {
        let key = metric_key(name, labels);
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key).or_insert(0) += amount;
        }
    }

    /// Returns a copy of the current counter map.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.counters.lock().map(|counters| counters.clone()).unwrap_or_default()
    }

    /// Clears all counters.
    pub fn reset(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.clear();
        }
    }
}

/// Builds the canonical counter key for a name and label set.
#[must_use]
pub fn metric_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let mut sorted: Vec<(&str, &str)> = labels.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let rendered: Vec<String> =
        sorted.iter().map(|(key, value)| format!("{key}={value}")).collect();
    format!("{name}|{}", rendered.join(","))
}

/// Sums a counter across all label combinations.
#[must_use]
pub fn metric_value(snapshot: &BTreeMap<String, i64>, prefix: &str) -> i64 {
    let labeled = format!("{prefix}|");
    snapshot
        .iter()
        .filter(|(key, _)| key.as_str() == prefix || key.starts_with(&labeled))
        .map(|(_, value)| *value)
        .sum()
}

// ============================================================================
// SECTION: Persistence And Export
// ============================================================================

/// Persists the current snapshot and pushes it to the export sink.
///
/// Returns false when the store write fails; export failures only log.
pub fn persist_snapshot(
    metrics: &MetricsRegistry,
    store: &SqliteGatewayStore,
    export: &ObservabilityExportSettings,
    log: &dyn LogSink,
    source: &str,
    request_id: Option<&str>,
    reset_after_persist: bool,
) -> bool {
    let snapshot = metrics.snapshot();
    let now = now_rfc3339();
    if let Err(err) = store.insert_metrics_snapshot(source, request_id, &snapshot, &now) {
        log_event(
            log,
            "metrics_snapshot_persist_failed",
            request_id,
            &[("source", json!(source)), ("error", json!(err.to_string()))],
        );
        return false;
    }
    if let Some(url) = &export.url {
        export_snapshot(export, url, log, source, request_id, &snapshot);
    }
    log_event(
        log,
        "metrics_snapshot_persisted",
        request_id,
        &[("source", json!(source)), ("counter_count", json!(snapshot.len()))],
    );
    if reset_after_persist {
        metrics.reset();
    }
    true
}

/// Pushes one snapshot to the configured export sink.
fn export_snapshot(
    export: &ObservabilityExportSettings,
    url: &str,
    log: &dyn LogSink,
    source: &str,
    request_id: Option<&str>,
    snapshot: &BTreeMap<String, i64>,
) {
    let timeout = Duration::from_secs_f64(export.timeout_seconds);
    let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(err) => {
            log_event(
                log,
                "metrics_snapshot_export_failed",
                request_id,
                &[("source", json!(source)), ("error", json!(err.to_string()))],
            );
            return;
        }
    };
    let mut request = client.post(url).json(&json!({
        "source": source,
        "request_id": request_id,
        "counters": snapshot,
    }));
    if let Some(token) = &export.bearer_token {
        request = request.bearer_auth(token);
    }
    match request.send() {
        Ok(response) if response.status().is_success() => {
            log_event(
                log,
                "metrics_snapshot_exported",
                request_id,
                &[
                    ("source", json!(source)),
                    ("export_url", json!(url)),
                    ("status_code", json!(response.status().as_u16())),
                ],
            );
        }
        Ok(response) => {
            log_event(
                log,
                "metrics_snapshot_export_failed",
                request_id,
                &[
                    ("source", json!(source)),
                    ("export_url", json!(url)),
                    ("status_code", json!(response.status().as_u16())),
                ],
            );
        }
        Err(err) => {
            log_event(
                log,
                "metrics_snapshot_export_failed",
                request_id,
                &[
                    ("source", json!(source)),
                    ("export_url", json!(url)),
                    ("error", json!(err.to_string())),
                ],
            );
        }
    }
}

// ============================================================================
// SECTION: SLO Hooks
// ============================================================================

/// Evaluates the direct-mail SLO rates against configured thresholds.
///
/// Each breached rate increments `webhook.slo.threshold_exceeded` with the
/// offending metric label; negative thresholds disable their check.
pub fn emit_slo_hooks(
    metrics: &MetricsRegistry,
    thresholds: &SloThresholds,
    log: &dyn LogSink,
    request_id: Option<&str>,
    source: &str,
) {
    let snapshot = metrics.snapshot();
    let received = metric_value(&snapshot, "webhook.events.received").max(0);
    let accepted = metric_value(&snapshot, "webhook.events.accepted").max(0);
    let rejected = metric_value(&snapshot, "webhook.events.rejected").max(0);
    let dead_letters = metric_value(&snapshot, "webhook.dead_letter.created").max(0);
    let projection_failed = metric_value(&snapshot, "webhook.projection.failure").max(0);
    let duplicate_ignored = metric_value(&snapshot, "webhook.duplicate_ignored").max(0);
    let replay_processed = metric_value(&snapshot, "webhook.replay_processed").max(0);
    let replay_failed = metric_value(&snapshot, "webhook.replay_failed").max(0);

    let checks = [
        ("signature_reject_rate", rate(rejected, received), thresholds.signature_reject_rate),
        ("dead_letter_rate", rate(dead_letters, accepted), thresholds.dead_letter_rate),
        (
            "projection_failure_rate",
            rate(projection_failed, accepted),
            thresholds.projection_failure_rate,
        ),
        (
            "replay_failure_rate",
            rate(replay_failed, replay_failed + replay_processed),
            thresholds.replay_failure_rate,
        ),
        (
            "duplicate_ignore_rate",
            rate(duplicate_ignored, received),
            thresholds.duplicate_ignore_rate,
        ),
    ];
    for (metric_name, measured, threshold) in checks {
        if threshold < 0.0 {
            continue;
        }
        if measured >= threshold {
            metrics.incr(
                "webhook.slo.threshold_exceeded",
                &[("provider_slug", "lob"), ("metric", metric_name)],
            );
            log_event(
                log,
                "lob_slo_threshold_exceeded",
                request_id,
                &[
                    ("source", json!(source)),
                    ("metric", json!(metric_name)),
                    ("measured", json!(measured)),
                    ("threshold", json!(threshold)),
                ],
            );
        }
    }
}

/// Computes a ratio with a floor-of-one denominator.
#[allow(clippy::cast_precision_loss, reason = "Counter magnitudes stay far below 2^52.")]
fn rate(numerator: i64, denominator: i64) -> f64 {
    numerator as f64 / denominator.max(1) as f64
}
