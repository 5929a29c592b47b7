// crates/outreach-gate-server/src/replay/tests.rs
// ============================================================================
// Module: Replay Controller Unit Tests
// Description: Unit tests for single replay and the bulk replay machine.
// Purpose: Validate replay monotonicity, dedupe, and bounded batching.
// Dependencies: outreach-gate-server, tempfile
// ============================================================================

//! ## Overview
//! Seeds dead-lettered events into a temp store and drives the replay core
//! and the batched machine directly.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::sync::Arc;

use outreach_gate_config::GatewaySettings;
use outreach_gate_config::ReplayControls;
use outreach_gate_core::Capability;
use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::normalize::PieceStatus;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_store_sqlite::GatewayStoreConfig;
use outreach_gate_store_sqlite::NewEvent;
use outreach_gate_store_sqlite::NewPiece;
use outreach_gate_store_sqlite::SqliteGatewayStore;
use serde_json::json;
use tempfile::TempDir;

use super::replay_event;
use super::replay_keys_batched;
use crate::log::NoopLogSink;
use crate::metrics::MetricsRegistry;
use crate::projection::ProjectionError;
use crate::projection::record_dead_letter;
use crate::reconciliation::adapter_poller_factory;
use crate::server::GatewayState;

/// Builds a state over a temp store with the provider registry seeded.
fn test_state(dir: &TempDir) -> Arc<GatewayState> {
    let store = Arc::new(
        SqliteGatewayStore::new(&GatewayStoreConfig::new(dir.path().join("gate.db")))
            .expect("open store"),
    );
    for (slug, capability) in [
        ("smartlead", Capability::EmailOutreach),
        ("lob", Capability::DirectMail),
    ] {
        store.upsert_provider(slug, capability).expect("seed provider");
    }
    Arc::new(GatewayState {
        settings: GatewaySettings::from_lookup(|_| None).expect("settings"),
        store,
        metrics: Arc::new(MetricsRegistry::new()),
        log: Arc::new(NoopLogSink),
        pollers: adapter_poller_factory(),
    })
}

/// Dead-letters one unresolvable direct-mail event under the given key.
fn seed_dead_letter(state: &GatewayState, event_key: &str, piece_external_id: &str) {
    let payload = json!({
        "type": "postcard.created",
        "body": {"resource": {"id": piece_external_id, "object": "postcard"}},
        "resource_id": piece_external_id,
    });
    state
        .store
        .insert_event(&NewEvent {
            provider_slug: "lob".to_string(),
            event_key: event_key.to_string(),
            event_type: "piece.created".to_string(),
            status: WebhookEventStatus::Processed,
            payload: payload.clone(),
            org_id: None,
            company_id: None,
            created_at: now_rfc3339(),
            processed_at: None,
        })
        .expect("seed event");
    record_dead_letter(
        state,
        "lob",
        event_key,
        "piece.created",
        &payload,
        None,
        None,
        &ProjectionError::unresolved(),
        None,
    );
}

/// Creates the tenant piece that makes a dead letter replayable.
fn seed_piece(state: &GatewayState, piece_external_id: &str) {
    let provider = state
        .store
        .provider_by_slug("lob")
        .expect("provider read")
        .expect("provider seeded");
    state
        .store
        .insert_piece(
            &NewPiece {
                org_id: OrgId::new("org-1"),
                company_id: CompanyId::new("co-1"),
                provider_id: provider.id,
                external_piece_id: piece_external_id.to_string(),
                piece_type: outreach_gate_core::PieceType::Postcard,
                status: PieceStatus::Queued,
                send_date: None,
                metadata: None,
                raw_payload: json!({}),
            },
            &now_rfc3339(),
        )
        .expect("seed piece");
}

#[test]
fn successful_replay_increments_count_once() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    seed_dead_letter(&state, "lob:evt-1", "psc_1");
    seed_piece(&state, "psc_1");

    let event = state.store.get_event("lob", "lob:evt-1").expect("read").expect("event");
    assert_eq!(event.status, WebhookEventStatus::DeadLetter);
    let event_type = replay_event(&state, "lob", &event, "req-test").expect("replayed");
    assert_eq!(event_type, "piece.created");

    let after = state.store.get_event("lob", "lob:evt-1").expect("read").expect("event");
    assert_eq!(after.status, WebhookEventStatus::Replayed);
    assert_eq!(after.replay_count, 1);
    assert!(after.last_replay_at.is_some());
    assert!(after.last_error.is_none());
}

#[test]
fn failed_replay_leaves_count_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    seed_dead_letter(&state, "lob:evt-2", "psc_still_missing");

    let event = state.store.get_event("lob", "lob:evt-2").expect("read").expect("event");
    let failure = replay_event(&state, "lob", &event, "req-test").expect_err("still failing");
    assert!(!failure.retryable);
    assert_eq!(failure.detail["type"], "webhook_replay_failed");

    let after = state.store.get_event("lob", "lob:evt-2").expect("read").expect("event");
    assert_eq!(after.status, WebhookEventStatus::DeadLetter);
    assert_eq!(after.replay_count, 0);
    assert!(after.last_error.is_some());
}

#[test]
fn batched_replay_dedupes_and_reports_outcomes() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    // Two recoverable events, one that keeps failing, one unknown key.
    seed_dead_letter(&state, "lob:evt-a", "psc_a");
    seed_dead_letter(&state, "lob:evt-b", "psc_b");
    seed_dead_letter(&state, "lob:evt-c", "psc_missing");
    seed_piece(&state, "psc_a");
    seed_piece(&state, "psc_b");

    let controls = ReplayControls::clamped(2, 500, 0, 0, 2.0, 2, 2);
    let keys = vec![
        "lob:evt-a".to_string(),
        "lob:evt-a".to_string(),
        "lob:evt-b".to_string(),
        "lob:evt-c".to_string(),
        "lob:evt-unknown".to_string(),
    ];
    let (results, counters) =
        replay_keys_batched(&state, "lob", &keys, true, &controls, "req-test");
    assert_eq!(counters.replayed, 2);
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.not_found, 1);
    assert_eq!(results.len(), 5);

    let duplicate = results
        .iter()
        .find(|item| item.error.as_deref() == Some("duplicate_request_key_ignored"))
        .expect("dedupe marker");
    assert_eq!(duplicate.event_key, "lob:evt-a");
    assert_eq!(duplicate.status, "replayed");

    let recovered = state.store.get_event("lob", "lob:evt-a").expect("read").expect("event");
    assert_eq!(recovered.status, WebhookEventStatus::Replayed);
    assert_eq!(recovered.replay_count, 1);
}

#[test]
fn batched_replay_respects_worker_bounds_with_large_input() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let mut keys = Vec::new();
    for index in 0..20 {
        let event_key = format!("lob:bulk-{index}");
        let piece = format!("psc_bulk_{index}");
        seed_dead_letter(&state, &event_key, &piece);
        seed_piece(&state, &piece);
        keys.push(event_key);
    }
    // queue_size caps in-flight work at 3; everything still completes.
    let controls = ReplayControls::clamped(5, 500, 0, 0, 2.0, 3, 3);
    let (results, counters) =
        replay_keys_batched(&state, "lob", &keys, true, &controls, "req-test");
    assert_eq!(counters.replayed, 20);
    assert_eq!(counters.failed, 0);
    assert_eq!(results.len(), 20);
    for key in keys {
        let event = state.store.get_event("lob", &key).expect("read").expect("event");
        assert_eq!(event.status, WebhookEventStatus::Replayed);
        assert_eq!(event.replay_count, 1);
    }
}

#[test]
fn replayed_event_remains_visible_as_dead_letter_history() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    seed_dead_letter(&state, "lob:evt-h", "psc_h");
    seed_piece(&state, "psc_h");
    let event = state.store.get_event("lob", "lob:evt-h").expect("read").expect("event");
    replay_event(&state, "lob", &event, "req-test").expect("replayed");
    let after = state.store.get_event("lob", "lob:evt-h").expect("read").expect("event");
    // The `_dead_letter` sub-record survives recovery for inspection.
    assert!(after.is_dead_letter());
    assert_eq!(after.status, WebhookEventStatus::Replayed);
}
