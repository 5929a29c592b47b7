// crates/outreach-gate-config/src/settings/tests.rs
// ============================================================================
// Module: Settings Unit Tests
// Description: Unit tests for env parsing, defaults, and clamping.
// Purpose: Pin the configuration contract against injected environments.
// Dependencies: outreach-gate-config
// ============================================================================

//! ## Overview
//! Resolves settings from injected key maps to keep tests hermetic.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::collections::HashMap;

use super::GatewaySettings;
use super::LobSignatureMode;
use super::MessageSyncMode;
use super::ReplayControls;

/// Resolves settings from a literal key/value list.
fn settings_from(pairs: &[(&str, &str)]) -> GatewaySettings {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    GatewaySettings::from_lookup(|key| map.get(key).cloned()).expect("settings")
}

#[test]
fn defaults_without_environment() {
    let settings = settings_from(&[]);
    assert_eq!(settings.bind, "127.0.0.1:8080");
    assert!(settings.db_path.is_none());
    assert!(settings.smartlead_webhook_secret.is_none());
    assert_eq!(settings.lob_signature_mode, LobSignatureMode::PermissiveAudit);
    assert_eq!(settings.lob_signature_tolerance_seconds, 300);
    assert_eq!(settings.lob_schema_versions, vec!["v1".to_string()]);
    assert_eq!(settings.heyreach_message_sync_mode, MessageSyncMode::WebhookOnly);
    assert_eq!(settings.replay, ReplayControls::default());
    assert!((settings.export.timeout_seconds - 3.0).abs() < f64::EPSILON);
    assert!((settings.slo.dead_letter_rate - (-1.0)).abs() < f64::EPSILON);
}

#[test]
fn replay_controls_are_clamped() {
    let settings = settings_from(&[
        ("LOB_WEBHOOK_REPLAY_BATCH_SIZE", "100000"),
        ("LOB_WEBHOOK_REPLAY_MAX_EVENTS_PER_RUN", "0"),
        ("LOB_WEBHOOK_REPLAY_SLEEP_MS", "99999"),
        ("LOB_WEBHOOK_REPLAY_MAX_SLEEP_MS", "1"),
        ("LOB_WEBHOOK_REPLAY_BACKOFF_MULTIPLIER", "0.25"),
        ("LOB_WEBHOOK_REPLAY_MAX_CONCURRENT_WORKERS", "500"),
        ("LOB_WEBHOOK_REPLAY_QUEUE_SIZE", "2"),
    ]);
    assert_eq!(settings.replay.batch_size, 200);
    assert_eq!(settings.replay.max_events_per_run, 1);
    assert_eq!(settings.replay.sleep_ms, 10_000);
    // max_sleep clamps up to sleep_ms when configured below it.
    assert_eq!(settings.replay.max_sleep_ms, 10_000);
    assert!((settings.replay.backoff_multiplier - 1.0).abs() < f64::EPSILON);
    assert_eq!(settings.replay.workers, 32);
    assert_eq!(settings.replay.queue_size, 32);
}

#[test]
fn queue_size_defaults_to_worker_count() {
    let settings = settings_from(&[("LOB_WEBHOOK_REPLAY_MAX_CONCURRENT_WORKERS", "4")]);
    assert_eq!(settings.replay.workers, 4);
    assert_eq!(settings.replay.queue_size, 4);
}

#[test]
fn invalid_numbers_fall_back_to_defaults() {
    let settings = settings_from(&[
        ("LOB_WEBHOOK_REPLAY_BATCH_SIZE", "soon"),
        ("LOB_WEBHOOK_SIGNATURE_TOLERANCE_SECONDS", "-10"),
        ("OBSERVABILITY_EXPORT_TIMEOUT_SECONDS", "NaN"),
    ]);
    assert_eq!(settings.replay.batch_size, 25);
    assert_eq!(settings.lob_signature_tolerance_seconds, 0);
    assert!((settings.export.timeout_seconds - 3.0).abs() < f64::EPSILON);
}

#[test]
fn signature_mode_parsing() {
    let enforce = settings_from(&[("LOB_WEBHOOK_SIGNATURE_MODE", " Enforce ")]);
    assert_eq!(enforce.lob_signature_mode, LobSignatureMode::Enforce);
    let junk = settings_from(&[("LOB_WEBHOOK_SIGNATURE_MODE", "strict")]);
    assert_eq!(junk.lob_signature_mode, LobSignatureMode::PermissiveAudit);
}

#[test]
fn origin_allowlist_normalizes_hosts() {
    let settings = settings_from(&[(
        "EMAILBISON_WEBHOOK_ALLOWED_ORIGINS",
        "https://App.EmailBison.com, bison.example:8443 ,,",
    )]);
    assert_eq!(
        settings.emailbison_allowed_origins,
        vec!["app.emailbison.com".to_string(), "bison.example".to_string()]
    );
}

#[test]
fn schema_versions_csv() {
    let settings = settings_from(&[("LOB_WEBHOOK_SCHEMA_VERSIONS", "v1, v2")]);
    assert_eq!(settings.lob_schema_versions, vec!["v1".to_string(), "v2".to_string()]);
}

#[test]
fn principals_parse_with_optional_company() {
    let settings = settings_from(&[(
        "GATEWAY_API_PRINCIPALS",
        "tok-a=org-1:user-1:org_admin,tok-b=org-1:user-2:company_member:co-9",
    )]);
    assert_eq!(settings.auth.principals.len(), 2);
    assert_eq!(settings.auth.principals[0].role, "org_admin");
    assert!(settings.auth.principals[0].company_id.is_none());
    assert_eq!(settings.auth.principals[1].company_id.as_deref(), Some("co-9"));
}

#[test]
fn malformed_principal_is_rejected() {
    let map: HashMap<String, String> =
        [("GATEWAY_API_PRINCIPALS".to_string(), "tok-a=org-only".to_string())].into();
    let result = GatewaySettings::from_lookup(|key| map.get(key).cloned());
    assert!(result.is_err());
}

#[test]
fn require_db_path_errors_when_absent() {
    let settings = settings_from(&[]);
    assert!(settings.require_db_path().is_err());
    let with_path = settings_from(&[("GATEWAY_DB_PATH", "/tmp/gate.db")]);
    assert_eq!(with_path.require_db_path().expect("path"), "/tmp/gate.db");
}
