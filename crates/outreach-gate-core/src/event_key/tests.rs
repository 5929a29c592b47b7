// crates/outreach-gate-core/src/event_key/tests.rs
// ============================================================================
// Module: Event Key Unit Tests
// Description: Unit tests for deterministic event-key derivation.
// Purpose: Pin the key preference order used by ingest idempotency.
// Dependencies: outreach-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Pins generic and direct-mail key derivation, including the rule that an
//! explicit event id wins over the composite form.

#![allow(clippy::panic, reason = "Test-only assertions.")]

use serde_json::json;

use super::compute_event_key;
use super::compute_lob_event_key;
use crate::hashing::sha256_hex;

#[test]
fn explicit_event_id_wins() {
    let payload = json!({"event_id": "evt-1", "id": "row-2"});
    assert_eq!(compute_event_key(&payload, b"{}"), "evt-1");
}

#[test]
fn numeric_id_is_stringified() {
    assert_eq!(compute_event_key(&json!({"id": 42}), b"{}"), "42");
}

#[test]
fn body_hash_fallback() {
    let raw = br#"{"no":"identity"}"#;
    assert_eq!(compute_event_key(&json!({"no": "identity"}), raw), sha256_hex(raw));
}

#[test]
fn lob_explicit_id_beats_composite() {
    let payload = json!({
        "id": "evt_9",
        "type": "postcard.delivered",
        "date_created": "2026-02-01T00:00:00Z",
        "body": {"resource": {"id": "psc_1"}},
    });
    assert_eq!(compute_lob_event_key(&payload, b"{}"), "lob:evt_9");
}

#[test]
fn lob_composite_key() {
    let payload = json!({
        "type": "postcard.delivered",
        "date_created": "2026-02-01T00:00:00Z",
        "body": {"resource": {"id": "psc_1"}},
    });
    assert_eq!(
        compute_lob_event_key(&payload, b"{}"),
        "lob:psc_1:postcard.delivered:2026-02-01T00:00:00Z"
    );
}

#[test]
fn lob_hash_fallback_when_composite_incomplete() {
    let raw = br#"{"type":"postcard.delivered"}"#;
    let payload = json!({"type": "postcard.delivered"});
    assert_eq!(compute_lob_event_key(&payload, raw), format!("lob:{}", sha256_hex(raw)));
}
