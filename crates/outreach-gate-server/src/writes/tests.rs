// crates/outreach-gate-server/src/writes/tests.rs
// ============================================================================
// Module: Domain Write Unit Tests
// Description: Unit tests for authorization and entitlement gating.
// Purpose: Validate the pre-dispatch failure surface of write services.
// Dependencies: outreach-gate-server, tempfile, tokio
// ============================================================================

//! ## Overview
//! Exercises the write-service pattern up to the provider boundary: scope
//! rejections, missing entitlements, cross-tenant probes, and the 501
//! `provider_not_implemented` surface. Provider dispatch itself is covered
//! by the adapter tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use outreach_gate_config::GatewaySettings;
use outreach_gate_core::Capability;
use outreach_gate_core::CompanyId;
use outreach_gate_core::EntitlementStatus;
use outreach_gate_core::Inbox;
use outreach_gate_core::InboxId;
use outreach_gate_core::OrgId;
use outreach_gate_core::ProviderId;
use outreach_gate_core::normalize::CampaignStatus;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_store_sqlite::GatewayStoreConfig;
use outreach_gate_store_sqlite::NewCampaign;
use outreach_gate_store_sqlite::NewEntitlement;
use outreach_gate_store_sqlite::SqliteGatewayStore;
use serde_json::json;
use tempfile::TempDir;

use super::AddLeadsRequest;
use super::CreateCampaignRequest;
use super::WarmupRequest;
use super::add_campaign_leads;
use super::create_campaign;
use super::set_inbox_warmup;
use crate::log::NoopLogSink;
use crate::metrics::MetricsRegistry;
use crate::reconciliation::adapter_poller_factory;
use crate::server::GatewayState;

/// Environment wiring one admin and one company-scoped member principal.
const PRINCIPALS: &str =
    "tok-admin=org-1:user-1:org_admin,tok-member=org-1:user-2:company_member:co-1";

/// Builds a state with the principal environment and seeded providers.
fn test_state(dir: &TempDir) -> Arc<GatewayState> {
    let store = Arc::new(
        SqliteGatewayStore::new(&GatewayStoreConfig::new(dir.path().join("gate.db")))
            .expect("open store"),
    );
    for (slug, capability) in [
        ("smartlead", Capability::EmailOutreach),
        ("heyreach", Capability::LinkedinOutreach),
        ("lob", Capability::DirectMail),
    ] {
        store.upsert_provider(slug, capability).expect("seed provider");
    }
    Arc::new(GatewayState {
        settings: GatewaySettings::from_lookup(|key| match key {
            "GATEWAY_API_PRINCIPALS" => Some(PRINCIPALS.to_string()),
            _ => None,
        })
        .expect("settings"),
        store,
        metrics: Arc::new(MetricsRegistry::new()),
        log: Arc::new(NoopLogSink),
        pollers: adapter_poller_factory(),
    })
}

fn headers_with_bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
    );
    headers
}

#[tokio::test]
async fn create_campaign_requires_entitlement() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let err = create_campaign(
        State(Arc::clone(&state)),
        headers_with_bearer("tok-member"),
        axum::extract::Extension(crate::server::RequestId("req-test".to_string())),
        Json(CreateCampaignRequest {
            company_id: None,
            name: "Launch".to_string(),
            capability: "email_outreach".to_string(),
        }),
    )
    .await
    .expect_err("no entitlement");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_campaign_rejects_unknown_caller() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let err = create_campaign(
        State(Arc::clone(&state)),
        headers_with_bearer("tok-unknown"),
        axum::extract::Extension(crate::server::RequestId("req-test".to_string())),
        Json(CreateCampaignRequest {
            company_id: Some("co-1".to_string()),
            name: "Launch".to_string(),
            capability: "email_outreach".to_string(),
        }),
    )
    .await
    .expect_err("unauthenticated");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn org_admin_must_name_a_company() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let err = create_campaign(
        State(Arc::clone(&state)),
        headers_with_bearer("tok-admin"),
        axum::extract::Extension(crate::server::RequestId("req-test".to_string())),
        Json(CreateCampaignRequest {
            company_id: None,
            name: "Launch".to_string(),
            capability: "email_outreach".to_string(),
        }),
    )
    .await
    .expect_err("missing company");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn direct_mail_capability_is_rejected_for_campaigns() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let err = create_campaign(
        State(Arc::clone(&state)),
        headers_with_bearer("tok-member"),
        axum::extract::Extension(crate::server::RequestId("req-test".to_string())),
        Json(CreateCampaignRequest {
            company_id: None,
            name: "Launch".to_string(),
            capability: "direct_mail".to_string(),
        }),
    )
    .await
    .expect_err("wrong capability");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

/// Seeds a campaign owned by a company the member cannot see.
fn seed_foreign_campaign(state: &GatewayState) -> outreach_gate_core::Campaign {
    let provider = state
        .store
        .provider_by_slug("smartlead")
        .expect("read")
        .expect("provider");
    state
        .store
        .insert_campaign(
            &NewCampaign {
                org_id: OrgId::new("org-1"),
                company_id: CompanyId::new("co-other"),
                provider_id: provider.id,
                external_campaign_id: "999".to_string(),
                name: "Foreign".to_string(),
                status: CampaignStatus::Drafted,
                created_by_user_id: None,
                raw_payload: json!({}),
            },
            &now_rfc3339(),
        )
        .expect("seed campaign")
}

#[tokio::test]
async fn cross_company_campaign_probe_is_404() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let campaign = seed_foreign_campaign(&state);
    let err = add_campaign_leads(
        State(Arc::clone(&state)),
        headers_with_bearer("tok-member"),
        Path(campaign.id.to_string()),
        Json(AddLeadsRequest {
            leads: vec![json!({"email": "ada@example.com"})],
        }),
    )
    .await
    .expect_err("cross-tenant probe");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn warmup_on_non_emailbison_provider_is_501() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir);
    let provider = state
        .store
        .provider_by_slug("smartlead")
        .expect("read")
        .expect("provider");
    let org_id = OrgId::new("org-1");
    let company_id = CompanyId::new("co-1");
    state
        .store
        .insert_entitlement(
            &NewEntitlement {
                org_id: org_id.clone(),
                company_id: company_id.clone(),
                capability: Capability::EmailOutreach,
                provider_id: provider.id.clone(),
                status: EntitlementStatus::Connected,
                provider_config: json!({}),
            },
            &now_rfc3339(),
        )
        .expect("seed entitlement");
    let inbox_id = InboxId::new("inbox-1");
    state
        .store
        .upsert_inbox(
            &Inbox {
                id: inbox_id.clone(),
                org_id,
                company_id,
                provider_id: ProviderId::new(provider.id.to_string()),
                external_account_id: "acct-1".to_string(),
                email: "sender@example.com".to_string(),
                status: "active".to_string(),
                warmup_enabled: false,
                deleted_at: None,
            },
            &now_rfc3339(),
        )
        .expect("seed inbox");

    let err = set_inbox_warmup(
        State(Arc::clone(&state)),
        headers_with_bearer("tok-member"),
        Path(inbox_id.to_string()),
        Json(WarmupRequest {
            enabled: true,
        }),
    )
    .await
    .expect_err("501 expected");
    assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(err.detail["type"], json!("provider_not_implemented"));
    assert_eq!(err.detail["provider"], json!("smartlead"));
}
