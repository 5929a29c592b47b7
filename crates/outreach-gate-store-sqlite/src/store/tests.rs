// crates/outreach-gate-store-sqlite/src/store/tests.rs
// ============================================================================
// Module: Gateway Store Unit Tests
// Description: Unit tests for the event store and domain table operations.
// Purpose: Validate idempotency, tenancy scoping, and upsert behavior.
// Dependencies: outreach-gate-store-sqlite, tempfile
// ============================================================================

//! ## Overview
//! Exercises the store against temp-file databases: the duplicate-event
//! guard, partial event updates, tenant-scoped lookups, and upsert keys.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::collections::BTreeMap;

use outreach_gate_core::Capability;
use outreach_gate_core::CompanyId;
use outreach_gate_core::EntitlementStatus;
use outreach_gate_core::OrgId;
use outreach_gate_core::Organization;
use outreach_gate_core::PieceType;
use outreach_gate_core::ProviderConfig;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::normalize::CampaignStatus;
use outreach_gate_core::normalize::LeadStatus;
use outreach_gate_core::normalize::MessageDirection;
use outreach_gate_core::normalize::PieceStatus;
use serde_json::json;
use tempfile::TempDir;

use super::EventFilter;
use super::EventUpdate;
use super::GatewayStoreConfig;
use super::GatewayStoreError;
use super::LeadUpsert;
use super::MessageUpsert;
use super::NewCampaign;
use super::NewEntitlement;
use super::NewEvent;
use super::NewPiece;
use super::SqliteGatewayStore;

const NOW: &str = "2026-03-01T12:00:00Z";
const LATER: &str = "2026-03-01T13:00:00Z";

fn open_store(dir: &TempDir) -> SqliteGatewayStore {
    let config = GatewayStoreConfig::new(dir.path().join("gate.db"));
    SqliteGatewayStore::new(&config).expect("open store")
}

fn sample_event(provider_slug: &str, event_key: &str) -> NewEvent {
    NewEvent {
        provider_slug: provider_slug.to_string(),
        event_key: event_key.to_string(),
        event_type: "campaign_status_updated".to_string(),
        status: WebhookEventStatus::Processed,
        payload: json!({"campaign_id": "123", "status": "ACTIVE"}),
        org_id: None,
        company_id: None,
        created_at: NOW.to_string(),
        processed_at: Some(NOW.to_string()),
    }
}

#[test]
fn event_insert_is_idempotent_per_key() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    store.insert_event(&sample_event("smartlead", "evt-1")).expect("first insert");
    let second = store.insert_event(&sample_event("smartlead", "evt-1"));
    match second {
        Err(GatewayStoreError::DuplicateEvent {
            provider_slug,
            event_key,
        }) => {
            assert_eq!(provider_slug, "smartlead");
            assert_eq!(event_key, "evt-1");
        }
        other => panic!("expected duplicate error, got {other:?}"),
    }
    // Same key on another provider is a distinct event.
    store.insert_event(&sample_event("heyreach", "evt-1")).expect("other provider");
}

#[test]
fn event_update_merges_partial_fields() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    store.insert_event(&sample_event("lob", "lob:evt-1")).expect("insert");
    let updated = store
        .update_event_by_key(
            "lob",
            "lob:evt-1",
            &EventUpdate {
                status: Some(WebhookEventStatus::DeadLetter),
                last_error: Some(Some("projection_unresolved".to_string())),
                processed_at: Some(LATER.to_string()),
                ..EventUpdate::default()
            },
        )
        .expect("update")
        .expect("event exists");
    assert_eq!(updated.status, WebhookEventStatus::DeadLetter);
    assert_eq!(updated.last_error.as_deref(), Some("projection_unresolved"));
    assert_eq!(updated.event_type, "campaign_status_updated");

    let replayed = store
        .update_event_by_key(
            "lob",
            "lob:evt-1",
            &EventUpdate {
                status: Some(WebhookEventStatus::Replayed),
                replay_count: Some(1),
                last_replay_at: Some(LATER.to_string()),
                last_error: Some(None),
                ..EventUpdate::default()
            },
        )
        .expect("update")
        .expect("event exists");
    assert_eq!(replayed.status, WebhookEventStatus::Replayed);
    assert_eq!(replayed.replay_count, 1);
    assert!(replayed.last_error.is_none());
    assert_eq!(replayed.last_replay_at.as_deref(), Some(LATER));
}

#[test]
fn event_update_missing_row_returns_none() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let result =
        store.update_event_by_key("lob", "lob:absent", &EventUpdate::default()).expect("update");
    assert!(result.is_none());
}

#[test]
fn event_listing_filters_and_orders() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let mut early = sample_event("smartlead", "evt-early");
    early.created_at = "2026-03-01T10:00:00Z".to_string();
    store.insert_event(&early).expect("insert early");
    store.insert_event(&sample_event("smartlead", "evt-late")).expect("insert late");
    store.insert_event(&sample_event("lob", "lob:evt-x")).expect("insert lob");

    let all = store
        .list_events(&EventFilter {
            limit: 10,
            ..EventFilter::default()
        })
        .expect("list");
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].created_at, NOW);

    let smartlead_only = store
        .list_events(&EventFilter {
            provider_slug: Some("smartlead".to_string()),
            from_ts: Some("2026-03-01T11:00:00Z".to_string()),
            limit: 10,
            ..EventFilter::default()
        })
        .expect("list");
    assert_eq!(smartlead_only.len(), 1);
    assert_eq!(smartlead_only[0].event_key, "evt-late");
}

/// Seeds one org, company, provider, and campaign; returns their ids.
fn seed_tenant(store: &SqliteGatewayStore) -> (OrgId, CompanyId, outreach_gate_core::Campaign) {
    let org_id = OrgId::new("org-1");
    let company_id = CompanyId::new("co-1");
    let mut provider_configs = BTreeMap::new();
    provider_configs.insert(
        "smartlead".to_string(),
        ProviderConfig {
            api_key: "sk-test".to_string(),
            instance_url: None,
            client_id: None,
        },
    );
    store
        .insert_organization(
            &Organization {
                id: org_id.clone(),
                slug: "org-one".to_string(),
                provider_configs,
                deleted_at: None,
            },
            NOW,
        )
        .expect("org");
    store.insert_company(&org_id, &company_id, "active", NOW).expect("company");
    let provider =
        store.upsert_provider("smartlead", Capability::EmailOutreach).expect("provider");
    let campaign = store
        .insert_campaign(
            &NewCampaign {
                org_id: org_id.clone(),
                company_id: company_id.clone(),
                provider_id: provider.id.clone(),
                external_campaign_id: "123".to_string(),
                name: "Launch".to_string(),
                status: CampaignStatus::Drafted,
                created_by_user_id: None,
                raw_payload: json!({}),
            },
            NOW,
        )
        .expect("campaign");
    (org_id, company_id, campaign)
}

#[test]
fn campaign_resolution_and_status_projection() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, _company_id, campaign) = seed_tenant(&store);

    let resolved = store
        .campaign_by_provider_external(&campaign.provider_id, "123")
        .expect("resolve")
        .expect("campaign found");
    assert_eq!(resolved.id, campaign.id);

    store
        .apply_campaign_status(
            &org_id,
            &campaign.id,
            CampaignStatus::Active,
            &json!({"status": "ACTIVE"}),
            LATER,
        )
        .expect("apply status");
    let after = store
        .campaign_by_id(&org_id, &campaign.id, None)
        .expect("read")
        .expect("campaign found");
    assert_eq!(after.status, CampaignStatus::Active);
    assert_eq!(after.raw_payload, json!({"status": "ACTIVE"}));
}

#[test]
fn campaign_lookup_is_tenant_scoped() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, _company_id, campaign) = seed_tenant(&store);

    let other_org = store
        .campaign_by_id(&OrgId::new("org-2"), &campaign.id, None)
        .expect("read");
    assert!(other_org.is_none());

    let other_company = store
        .campaign_by_id(&org_id, &campaign.id, Some(&CompanyId::new("co-2")))
        .expect("read");
    assert!(other_company.is_none());
}

#[test]
fn duplicate_live_campaign_is_conflict() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, company_id, campaign) = seed_tenant(&store);
    let result = store.insert_campaign(
        &NewCampaign {
            org_id,
            company_id,
            provider_id: campaign.provider_id,
            external_campaign_id: "123".to_string(),
            name: "Shadow".to_string(),
            status: CampaignStatus::Drafted,
            created_by_user_id: None,
            raw_payload: json!({}),
        },
        LATER,
    );
    assert!(matches!(result, Err(GatewayStoreError::Conflict(_))));
}

#[test]
fn lead_upsert_keys_on_external_id() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, company_id, campaign) = seed_tenant(&store);
    let upsert = LeadUpsert {
        org_id: org_id.clone(),
        company_id,
        company_campaign_id: campaign.id.clone(),
        provider_id: campaign.provider_id.clone(),
        external_lead_id: "lead-1".to_string(),
        email: Some("ada@example.com".to_string()),
        first_name: Some("Ada".to_string()),
        last_name: None,
        status: LeadStatus::Pending,
        raw_payload: json!({}),
    };
    let (lead_id, created) = store.upsert_lead(&upsert, NOW).expect("insert lead");
    assert!(created);
    let (second_id, created_again) = store
        .upsert_lead(
            &LeadUpsert {
                status: LeadStatus::Replied,
                ..upsert
            },
            LATER,
        )
        .expect("update lead");
    assert!(!created_again);
    assert_eq!(lead_id, second_id);
    let lead = store
        .lead_by_external(&org_id, &campaign.id, "lead-1")
        .expect("read")
        .expect("lead found");
    assert_eq!(lead.status, LeadStatus::Replied);
}

#[test]
fn message_upsert_keys_on_external_id() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, company_id, campaign) = seed_tenant(&store);
    let upsert = MessageUpsert {
        org_id,
        company_id,
        company_campaign_id: campaign.id,
        company_campaign_lead_id: None,
        provider_id: campaign.provider_id,
        external_message_id: "m-1".to_string(),
        direction: MessageDirection::Outbound,
        sequence_step_number: Some(1),
        subject: Some("hi".to_string()),
        body: None,
        sent_at: None,
        raw_payload: json!({}),
    };
    assert!(store.upsert_message(&upsert, NOW).expect("insert message"));
    assert!(!store.upsert_message(&upsert, LATER).expect("update message"));
}

#[test]
fn piece_insert_and_projection_update() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, company_id, _campaign) = seed_tenant(&store);
    let provider = store.upsert_provider("lob", Capability::DirectMail).expect("provider");
    let piece = store
        .insert_piece(
            &NewPiece {
                org_id: org_id.clone(),
                company_id,
                provider_id: provider.id.clone(),
                external_piece_id: "psc_1".to_string(),
                piece_type: PieceType::Postcard,
                status: PieceStatus::Queued,
                send_date: None,
                metadata: None,
                raw_payload: json!({}),
            },
            NOW,
        )
        .expect("insert piece");
    store
        .update_piece(
            &org_id,
            &piece.id,
            &super::PieceUpdate {
                status: PieceStatus::Delivered,
                send_date: Some("2026-03-05".to_string()),
                metadata: Some(json!({"batch": "b-1"})),
                raw_payload: json!({"type": "postcard.delivered"}),
            },
            LATER,
        )
        .expect("update piece");
    let found = store
        .piece_by_external(&provider.id, "psc_1")
        .expect("read")
        .expect("piece found");
    assert_eq!(found.status, PieceStatus::Delivered);
    assert_eq!(found.metadata, Some(json!({"batch": "b-1"})));
}

#[test]
fn entitlement_uniqueness_per_company_capability() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, company_id, campaign) = seed_tenant(&store);
    let new_entitlement = NewEntitlement {
        org_id,
        company_id,
        capability: Capability::EmailOutreach,
        provider_id: campaign.provider_id,
        status: EntitlementStatus::Connected,
        provider_config: json!({"smartlead_client_id": "77"}),
    };
    store.insert_entitlement(&new_entitlement, NOW).expect("first entitlement");
    let duplicate = store.insert_entitlement(&new_entitlement, LATER);
    assert!(matches!(duplicate, Err(GatewayStoreError::Conflict(_))));
}

#[test]
fn org_provider_config_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let (org_id, _company_id, _campaign) = seed_tenant(&store);
    let config = store
        .org_provider_config(&org_id, "smartlead")
        .expect("read")
        .expect("config present");
    assert_eq!(config.api_key, "sk-test");
    assert!(store.org_provider_config(&org_id, "lob").expect("read").is_none());
    assert!(
        store
            .org_provider_config(&OrgId::new("org-404"), "smartlead")
            .expect("read")
            .is_none()
    );
}

#[test]
fn metrics_snapshots_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let mut counters = BTreeMap::new();
    counters.insert("webhook.events.received|provider_slug=lob".to_string(), 3_i64);
    store
        .insert_metrics_snapshot("lob_webhook_ingest", Some("req-1"), &counters, NOW)
        .expect("persist");
    let listed = store.list_metrics_snapshots(10, 0).expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].source, "lob_webhook_ingest");
    assert_eq!(
        listed[0].counters.get("webhook.events.received|provider_slug=lob"),
        Some(&3_i64)
    );
}
