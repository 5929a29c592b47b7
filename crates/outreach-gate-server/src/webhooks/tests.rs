// crates/outreach-gate-server/src/webhooks/tests.rs
// ============================================================================
// Module: Webhook Gateway Unit Tests
// Description: Unit tests for the per-provider ingestion handlers.
// Purpose: Validate trust, idempotency, and dead-letter behavior end to end.
// Dependencies: outreach-gate-server, tempfile, tokio
// ============================================================================

//! ## Overview
//! Drives the ingest handlers directly with constructed extractors against a
//! temp store: the happy path, duplicate suppression, HMAC enforcement, and
//! the direct-mail dead-letter flow.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Extension;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::Response;
use outreach_gate_config::GatewaySettings;
use outreach_gate_core::Capability;
use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::normalize::CampaignStatus;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_store_sqlite::GatewayStoreConfig;
use outreach_gate_store_sqlite::NewCampaign;
use outreach_gate_store_sqlite::SqliteGatewayStore;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

use super::ingest_emailbison;
use super::ingest_emailbison_without_token;
use super::ingest_lob;
use super::ingest_smartlead;
use crate::log::NoopLogSink;
use crate::metrics::MetricsRegistry;
use crate::reconciliation::adapter_poller_factory;
use crate::server::GatewayState;
use crate::server::RequestId;
use crate::trust::hmac_sha256_hex;

/// Builds a state over a temp store with the provider registry seeded.
fn test_state(dir: &TempDir, env: &[(&str, &str)]) -> Arc<GatewayState> {
    let env: std::collections::HashMap<String, String> =
        env.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    let store = Arc::new(
        SqliteGatewayStore::new(&GatewayStoreConfig::new(dir.path().join("gate.db")))
            .expect("open store"),
    );
    for (slug, capability) in [
        ("smartlead", Capability::EmailOutreach),
        ("emailbison", Capability::EmailOutreach),
        ("heyreach", Capability::LinkedinOutreach),
        ("lob", Capability::DirectMail),
    ] {
        store.upsert_provider(slug, capability).expect("seed provider");
    }
    Arc::new(GatewayState {
        settings: GatewaySettings::from_lookup(move |key| env.get(key).cloned())
            .expect("settings"),
        store,
        metrics: Arc::new(MetricsRegistry::new()),
        log: Arc::new(NoopLogSink),
        pollers: adapter_poller_factory(),
    })
}

/// Seeds the smartlead campaign used by the happy-path scenarios.
fn seed_smartlead_campaign(state: &GatewayState) -> outreach_gate_core::Campaign {
    let provider = state
        .store
        .provider_by_slug("smartlead")
        .expect("provider read")
        .expect("provider seeded");
    state
        .store
        .insert_campaign(
            &NewCampaign {
                org_id: OrgId::new("org-1"),
                company_id: CompanyId::new("co-1"),
                provider_id: provider.id,
                external_campaign_id: "123".to_string(),
                name: "Launch".to_string(),
                status: CampaignStatus::Drafted,
                created_by_user_id: None,
                raw_payload: json!({}),
            },
            &now_rfc3339(),
        )
        .expect("seed campaign")
}

/// Reads a JSON response body.
async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("body json")
}

/// The request-id extension handlers expect from the middleware.
fn request_id() -> Extension<RequestId> {
    Extension(RequestId("req-test".to_string()))
}

#[tokio::test]
async fn smartlead_happy_path_processes_and_projects() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, &[]);
    let campaign = seed_smartlead_campaign(&state);
    let body = json!({
        "event": "campaign_status_updated",
        "campaign_id": "123",
        "status": "ACTIVE",
        "message_id": "m-1",
        "subject": "hi",
    });
    let response = ingest_smartlead(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body.to_string()),
    )
    .await
    .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "processed");

    let after = state
        .store
        .campaign_by_id(&campaign.org_id, &campaign.id, None)
        .expect("read")
        .expect("campaign");
    assert_eq!(after.status, CampaignStatus::Active);
    let event_key = body["event_key"].as_str().expect("event key");
    let event = state
        .store
        .get_event("smartlead", event_key)
        .expect("read")
        .expect("event row");
    assert_eq!(event.status, WebhookEventStatus::Processed);
}

#[tokio::test]
async fn duplicate_delivery_is_ignored_with_200() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, &[]);
    seed_smartlead_campaign(&state);
    let body = json!({
        "event_id": "evt-1",
        "event": "campaign_status_updated",
        "campaign_id": "123",
        "status": "ACTIVE",
    })
    .to_string();

    let first = ingest_smartlead(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body.clone()),
    )
    .await
    .expect("first");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["status"], "processed");

    let second = ingest_smartlead(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body),
    )
    .await
    .expect("second");
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["detail"], "Duplicate event ignored");

    // Exactly one row for the key.
    assert!(state.store.get_event("smartlead", "evt-1").expect("read").is_some());
}

#[tokio::test]
async fn hmac_enforced_when_secret_configured() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, &[("SMARTLEAD_WEBHOOK_SECRET", "secret123")]);
    let body = json!({"event": "x"}).to_string();

    let missing = ingest_smartlead(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body.clone()),
    )
    .await
    .expect_err("rejected");
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let mut headers = HeaderMap::new();
    let signature = hmac_sha256_hex(b"secret123", body.as_bytes());
    headers
        .insert("x-smartlead-signature", HeaderValue::from_str(&signature).expect("header"));
    let accepted = ingest_smartlead(
        State(Arc::clone(&state)),
        request_id(),
        headers,
        Bytes::from(body),
    )
    .await
    .expect("accepted");
    assert_eq!(accepted.status(), StatusCode::OK);
}

#[tokio::test]
async fn lob_enforce_missing_signature_creates_no_event() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(
        &dir,
        &[
            ("LOB_WEBHOOK_SIGNATURE_MODE", "enforce"),
            ("LOB_WEBHOOK_SECRET", "lob-secret"),
        ],
    );
    let body = json!({
        "id": "evt_1",
        "type": "postcard.created",
        "date_created": "2026-03-01T00:00:00Z",
        "body": {"resource": {"id": "psc_1"}},
    })
    .to_string();
    let err = ingest_lob(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body),
    )
    .await
    .expect_err("rejected");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.detail["reason"], "missing_signature");
    assert!(state.store.get_event("lob", "lob:evt_1").expect("read").is_none());
    let snapshot = state.metrics.snapshot();
    assert_eq!(
        snapshot
            .get("webhook.signature.rejected|provider_slug=lob,reason=missing_signature"),
        Some(&1_i64)
    );
}

#[tokio::test]
async fn lob_unresolved_piece_dead_letters_with_200() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, &[]);
    let body = json!({
        "id": "evt_dl",
        "type": "postcard.created",
        "date_created": "2026-03-01T00:00:00Z",
        "body": {"resource": {"id": "psc_missing", "object": "postcard"}},
    })
    .to_string();
    let response = ingest_lob(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body),
    )
    .await
    .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "dead_letter_recorded");
    assert_eq!(body["dead_letter"]["reason"], "projection_unresolved");

    let event = state
        .store
        .get_event("lob", "lob:evt_dl")
        .expect("read")
        .expect("event row");
    assert_eq!(event.status, WebhookEventStatus::DeadLetter);
}

#[tokio::test]
async fn lob_schema_invalid_dead_letters_with_missing_fields() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, &[]);
    // Missing resource.id and date_created.
    let body = json!({"id": "evt_bad", "type": "postcard.created"}).to_string();
    let response = ingest_lob(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from(body),
    )
    .await
    .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "dead_letter_recorded");
    assert_eq!(body["dead_letter"]["reason"], "schema_invalid");

    let event = state
        .store
        .get_event("lob", "lob:evt_bad")
        .expect("read")
        .expect("event row");
    let meta = event.dead_letter_meta().expect("meta");
    assert_eq!(meta["error"], "schema_invalid:date_created,resource.id");
}

#[tokio::test]
async fn lob_malformed_json_dead_letters() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, &[]);
    let response = ingest_lob(
        State(Arc::clone(&state)),
        request_id(),
        HeaderMap::new(),
        Bytes::from_static(b"{not json"),
    )
    .await
    .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "dead_letter_recorded");
    assert_eq!(body["dead_letter"]["reason"], "malformed_payload");
}

#[tokio::test]
async fn emailbison_base_route_requires_token() {
    let err = ingest_emailbison_without_token().await.expect_err("rejected");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.detail["reason"], "missing_path_token");
}

#[tokio::test]
async fn emailbison_accepts_and_defers_projection() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(
        &dir,
        &[
            ("EMAILBISON_WEBHOOK_PATH_TOKEN", "tok-123"),
            ("EMAILBISON_WEBHOOK_ALLOWED_ORIGINS", "emailbison.com"),
        ],
    );
    let mut headers = HeaderMap::new();
    headers.insert("origin", HeaderValue::from_static("https://app.emailbison.com"));
    let body = json!({"event_id": "eb-1", "event": "lead_replied", "campaign_id": "9"});
    let response = ingest_emailbison(
        State(Arc::clone(&state)),
        Path("tok-123".to_string()),
        request_id(),
        headers,
        Bytes::from(body.to_string()),
    )
    .await
    .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["non_cryptographic_trust"], true);

    let event = state
        .store
        .get_event("emailbison", "eb-1")
        .expect("read")
        .expect("event row");
    // The row is stored before the background projection flips it.
    assert!(matches!(
        event.status,
        WebhookEventStatus::Accepted | WebhookEventStatus::Processed
    ));
    let ingestion = event.payload.get("_ingestion").expect("ingestion metadata");
    assert_eq!(ingestion["trust_mode"], "unsigned_origin_plus_path_token");
    assert_eq!(ingestion["origin_host"], "app.emailbison.com");
}

#[tokio::test]
async fn emailbison_path_token_mismatch_is_401() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(
        &dir,
        &[
            ("EMAILBISON_WEBHOOK_PATH_TOKEN", "tok-123"),
            ("EMAILBISON_WEBHOOK_ALLOWED_ORIGINS", "emailbison.com"),
        ],
    );
    let err = ingest_emailbison(
        State(Arc::clone(&state)),
        Path("tok-wrong".to_string()),
        request_id(),
        HeaderMap::new(),
        Bytes::from_static(b"{}"),
    )
    .await
    .expect_err("rejected");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.detail["reason"], "invalid_path_token");
}
