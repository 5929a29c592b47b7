// crates/outreach-gate-core/src/payload/tests.rs
// ============================================================================
// Module: Payload Accessor Unit Tests
// Description: Unit tests for tolerant webhook field extraction.
// Purpose: Validate snake/camel tolerance and the direct-mail schema check.
// Dependencies: outreach-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises the payload accessors against mixed-convention provider bodies.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use serde_json::json;

use super::SchemaValidationError;
use super::extract_campaign_id;
use super::extract_campaign_status;
use super::extract_event_type;
use super::extract_lead_id;
use super::extract_lead_status;
use super::extract_lob_payload_version;
use super::extract_lob_resource_id;
use super::extract_message_id;
use super::extract_sequence_step_number;
use super::validate_lob_payload_schema;

#[test]
fn event_type_fallback_chain() {
    assert_eq!(extract_event_type(&json!({"event": "lead_replied"})), "lead_replied");
    assert_eq!(extract_event_type(&json!({"event_type": "sent"})), "sent");
    assert_eq!(extract_event_type(&json!({"type": "postcard.created"})), "postcard.created");
    assert_eq!(extract_event_type(&json!({})), "unknown");
}

#[test]
fn campaign_id_accepts_camel_and_nested() {
    assert_eq!(extract_campaign_id(&json!({"campaign_id": 42})), Some("42".to_string()));
    assert_eq!(extract_campaign_id(&json!({"campaignId": "abc"})), Some("abc".to_string()));
    assert_eq!(
        extract_campaign_id(&json!({"campaign": {"id": 7}})),
        Some("7".to_string())
    );
    assert_eq!(extract_campaign_id(&json!({"campaign": "flat"})), None);
}

#[test]
fn lead_and_message_ids() {
    assert_eq!(extract_lead_id(&json!({"leadId": 9})), Some("9".to_string()));
    assert_eq!(extract_lead_id(&json!({"lead": {"id": "x"}})), Some("x".to_string()));
    assert_eq!(
        extract_message_id(&json!({"email_stats_id": "st-1", "id": "evt-1"})),
        Some("st-1".to_string())
    );
    assert_eq!(extract_message_id(&json!({"id": "evt-1"})), Some("evt-1".to_string()));
}

#[test]
fn sequence_step_requires_one_based_values() {
    assert_eq!(extract_sequence_step_number(&json!({"step_number": 3})), Some(3));
    assert_eq!(extract_sequence_step_number(&json!({"stepNumber": "2"})), Some(2));
    assert_eq!(extract_sequence_step_number(&json!({"seq_number": 0})), None);
    assert_eq!(extract_sequence_step_number(&json!({"step_number": "soon"})), None);
}

#[test]
fn status_hints_respect_vocabulary_guards() {
    assert_eq!(
        extract_campaign_status(&json!({"campaign_status": "running"})),
        Some("running".to_string())
    );
    assert_eq!(
        extract_campaign_status(&json!({"status": "PAUSED"})),
        Some("PAUSED".to_string())
    );
    // A bare lead-vocabulary status must not be read as a campaign status.
    assert_eq!(extract_campaign_status(&json!({"status": "replied"})), None);
    assert_eq!(
        extract_lead_status(&json!({"status": "replied"})),
        Some("replied".to_string())
    );
    assert_eq!(extract_lead_status(&json!({"status": "RUNNING"})), None);
}

#[test]
fn lob_resource_id_prefers_nested_resource() {
    let payload = json!({
        "body": {"resource": {"id": "psc_123"}},
        "resource_id": "flat_999",
    });
    assert_eq!(extract_lob_resource_id(&payload), Some("psc_123".to_string()));
    assert_eq!(
        extract_lob_resource_id(&json!({"piece_id": "psc_5"})),
        Some("psc_5".to_string())
    );
}

#[test]
fn lob_version_defaults_to_v1() {
    assert_eq!(extract_lob_payload_version(&json!({})), "v1");
    assert_eq!(extract_lob_payload_version(&json!({"version": " v2 "})), "v2");
}

#[test]
fn schema_validation_lists_missing_fields() {
    let supported = vec!["v1".to_string()];
    let err = validate_lob_payload_schema(&json!({"id": "evt_1"}), &supported)
        .expect_err("schema failure");
    assert_eq!(
        err,
        SchemaValidationError::SchemaInvalid("type,date_created,resource.id".to_string())
    );
    assert_eq!(err.reason(), "schema_invalid");
}

#[test]
fn schema_validation_rejects_unsupported_version() {
    let supported = vec!["v1".to_string()];
    let err = validate_lob_payload_schema(&json!({"version": "v9"}), &supported)
        .expect_err("version failure");
    assert_eq!(err, SchemaValidationError::VersionUnsupported("v9".to_string()));
    assert_eq!(err.reason(), "version_unsupported");
}

#[test]
fn schema_validation_accepts_complete_payload() {
    let supported = vec!["v1".to_string()];
    let payload = json!({
        "id": "evt_1",
        "type": "postcard.delivered",
        "date_created": "2026-02-01T00:00:00Z",
        "body": {"resource": {"id": "psc_1"}},
    });
    assert_eq!(validate_lob_payload_schema(&payload, &supported), Ok("v1".to_string()));
}
