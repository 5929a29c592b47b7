// crates/outreach-gate-server/src/trust/tests.rs
// ============================================================================
// Module: Trust Policy Unit Tests
// Description: Unit tests for the three webhook trust models.
// Purpose: Pin rejection reasons, modes, and allowlist semantics.
// Dependencies: outreach-gate-server
// ============================================================================

//! ## Overview
//! Exercises HMAC verification, the replay-window signature in both modes,
//! and the unsigned-origin contract.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use outreach_gate_config::GatewaySettings;
use outreach_gate_config::LobSignatureMode;
use outreach_gate_core::time::now_utc;
use serde_json::json;
use time::format_description::well_known::Rfc3339;

use super::hmac_sha256_hex;
use super::is_allowed_origin;
use super::request_origin_host;
use super::verify_emailbison_contract;
use super::verify_hmac_or_reject;
use super::verify_lob_signature;
use crate::log::NoopLogSink;
use crate::metrics::MetricsRegistry;
use crate::metrics::metric_value;

/// Settings resolved from an empty environment.
fn base_settings() -> GatewaySettings {
    GatewaySettings::from_lookup(|_| None).expect("settings")
}

#[test]
fn hmac_accepts_when_no_secret_configured() {
    assert!(verify_hmac_or_reject(b"{}", None, None).is_ok());
    assert!(verify_hmac_or_reject(b"{}", Some("junk"), None).is_ok());
}

#[test]
fn hmac_requires_matching_signature() {
    let secret = "secret123";
    let body = br#"{"event":"x"}"#;
    let valid = hmac_sha256_hex(secret.as_bytes(), body);
    assert!(verify_hmac_or_reject(body, Some(&valid), Some(secret)).is_ok());

    let missing = verify_hmac_or_reject(body, None, Some(secret)).expect_err("missing");
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    let wrong = verify_hmac_or_reject(body, Some("beef"), Some(secret)).expect_err("mismatch");
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

/// Builds enforce-mode settings with a secret.
fn enforce_settings() -> GatewaySettings {
    let mut settings = base_settings();
    settings.lob_signature_mode = LobSignatureMode::Enforce;
    settings.lob_webhook_secret = Some("lob-secret".to_string());
    settings
}

/// Signs a body the way the producer does.
fn lob_headers(secret: &str, timestamp: &str, body: &[u8]) -> HeaderMap {
    let mut signing_input = Vec::new();
    signing_input.extend_from_slice(timestamp.as_bytes());
    signing_input.push(b'.');
    signing_input.extend_from_slice(body);
    let signature = hmac_sha256_hex(secret.as_bytes(), &signing_input);
    let mut headers = HeaderMap::new();
    headers.insert("lob-signature", HeaderValue::from_str(&signature).expect("header"));
    headers
        .insert("lob-signature-timestamp", HeaderValue::from_str(timestamp).expect("header"));
    headers
}

#[test]
fn lob_enforce_missing_signature_is_401_with_reason() {
    let settings = enforce_settings();
    let metrics = MetricsRegistry::new();
    let err = verify_lob_signature(
        &settings,
        &metrics,
        &NoopLogSink,
        &HeaderMap::new(),
        b"{}",
        None,
    )
    .expect_err("rejected");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.detail["reason"], json!("missing_signature"));
    let snapshot = metrics.snapshot();
    assert_eq!(
        snapshot
            .get("webhook.signature.rejected|provider_slug=lob,reason=missing_signature"),
        Some(&1_i64)
    );
}

#[test]
fn lob_enforce_without_secret_is_503() {
    let mut settings = base_settings();
    settings.lob_signature_mode = LobSignatureMode::Enforce;
    let metrics = MetricsRegistry::new();
    let err =
        verify_lob_signature(&settings, &metrics, &NoopLogSink, &HeaderMap::new(), b"{}", None)
            .expect_err("config error");
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.detail["type"], json!("webhook_signature_configuration_error"));
}

#[test]
fn lob_enforce_accepts_valid_signature() {
    let settings = enforce_settings();
    let metrics = MetricsRegistry::new();
    let body = br#"{"id":"evt_1"}"#;
    let timestamp = now_utc().format(&Rfc3339).expect("timestamp");
    let headers = lob_headers("lob-secret", &timestamp, body);
    let result =
        verify_lob_signature(&settings, &metrics, &NoopLogSink, &headers, body, None)
            .expect("verified");
    assert!(result.verified);
    assert_eq!(result.reason, "verified");
}

#[test]
fn lob_enforce_rejects_stale_timestamp() {
    let settings = enforce_settings();
    let metrics = MetricsRegistry::new();
    let body = b"{}";
    let headers = lob_headers("lob-secret", "2020-01-01T00:00:00Z", body);
    let err = verify_lob_signature(&settings, &metrics, &NoopLogSink, &headers, body, None)
        .expect_err("stale");
    assert_eq!(err.detail["reason"], json!("stale_timestamp"));
}

#[test]
fn lob_permissive_audits_instead_of_rejecting() {
    let mut settings = enforce_settings();
    settings.lob_signature_mode = LobSignatureMode::PermissiveAudit;
    let metrics = MetricsRegistry::new();
    let result = verify_lob_signature(
        &settings,
        &metrics,
        &NoopLogSink,
        &HeaderMap::new(),
        b"{}",
        None,
    )
    .expect("accepted in audit mode");
    assert!(!result.verified);
    assert_eq!(result.reason, "missing_signature");
    let snapshot = metrics.snapshot();
    assert_eq!(metric_value(&snapshot, "webhook.signature.audit_failed"), 1);
    assert_eq!(metric_value(&snapshot, "webhook.events.rejected"), 0);
}

#[test]
fn origin_host_preference_chain() {
    let mut headers = HeaderMap::new();
    headers.insert("host", HeaderValue::from_static("gateway.internal:8080"));
    assert_eq!(request_origin_host(&headers), Some("gateway.internal".to_string()));
    headers.insert("x-forwarded-host", HeaderValue::from_static("edge.example, inner"));
    assert_eq!(request_origin_host(&headers), Some("edge.example".to_string()));
    headers.insert("origin", HeaderValue::from_static("https://App.EmailBison.com"));
    assert_eq!(request_origin_host(&headers), Some("app.emailbison.com".to_string()));
}

#[test]
fn allowlist_matches_exact_and_subdomain() {
    let allowlist = vec!["emailbison.com".to_string()];
    assert!(is_allowed_origin("emailbison.com", &allowlist));
    assert!(is_allowed_origin("app.emailbison.com", &allowlist));
    assert!(!is_allowed_origin("evilemailbison.com", &allowlist));
    assert!(!is_allowed_origin("emailbison.com.evil.example", &allowlist));
}

#[test]
fn emailbison_contract_rejections() {
    let mut settings = base_settings();
    let headers = HeaderMap::new();
    // No token configured: configuration error.
    let err = verify_emailbison_contract(&settings, &headers, "tok").expect_err("unconfigured");
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

    settings.emailbison_path_token = Some("path-token".to_string());
    settings.emailbison_allowed_origins = vec!["emailbison.com".to_string()];

    let err = verify_emailbison_contract(&settings, &headers, "wrong").expect_err("bad token");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.detail["reason"], json!("invalid_path_token"));

    let err =
        verify_emailbison_contract(&settings, &headers, "path-token").expect_err("no origin");
    assert_eq!(err.detail["reason"], json!("missing_origin"));

    let mut bad_origin = HeaderMap::new();
    bad_origin.insert("origin", HeaderValue::from_static("https://spoof.example"));
    let err = verify_emailbison_contract(&settings, &bad_origin, "path-token")
        .expect_err("bad origin");
    assert_eq!(err.detail["reason"], json!("origin_not_allowed"));

    let mut good_origin = HeaderMap::new();
    good_origin.insert("origin", HeaderValue::from_static("https://app.emailbison.com"));
    let host = verify_emailbison_contract(&settings, &good_origin, "path-token")
        .expect("admitted");
    assert_eq!(host, "app.emailbison.com");
}
