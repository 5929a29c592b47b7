// crates/outreach-gate-core/src/lib.rs
// ============================================================================
// Module: Outreach Gate Core Library
// Description: Domain model and pure helpers for the outreach gateway.
// Purpose: Share identifiers, canonical enums, and classification logic.
// Dependencies: serde, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Outreach Gate Core defines the tenant-scoped domain model (organizations,
//! campaigns, leads, messages, direct-mail pieces, webhook events), the total
//! normalization functions that map provider vocabularies onto canonical
//! enums, the provider-error envelope, and the dynamic-payload accessors used
//! by the webhook gateway and projection engine. Everything here is pure:
//! no I/O, no clocks beyond explicit timestamp helpers.
//!
//! Security posture: webhook payloads and provider responses are untrusted
//! input; accessors tolerate missing or oddly shaped fields and never panic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod domain;
pub mod event_key;
pub mod hashing;
pub mod ids;
pub mod normalize;
pub mod payload;
pub mod provider_error;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use domain::Campaign;
pub use domain::CampaignLead;
pub use domain::CampaignMessage;
pub use domain::Capability;
pub use domain::Company;
pub use domain::DirectMailPiece;
pub use domain::Entitlement;
pub use domain::EntitlementStatus;
pub use domain::Inbox;
pub use domain::MessageSyncStatus;
pub use domain::MetricsSnapshot;
pub use domain::Organization;
pub use domain::PieceType;
pub use domain::Provider;
pub use domain::ProviderConfig;
pub use domain::WebhookEvent;
pub use domain::WebhookEventStatus;
pub use event_key::compute_event_key;
pub use event_key::compute_lob_event_key;
pub use hashing::sha256_hex;
pub use ids::CampaignId;
pub use ids::CompanyId;
pub use ids::EventId;
pub use ids::InboxId;
pub use ids::LeadId;
pub use ids::MessageId;
pub use ids::OrgId;
pub use ids::PieceId;
pub use ids::ProviderId;
pub use ids::UserId;
pub use normalize::CampaignStatus;
pub use normalize::LeadStatus;
pub use normalize::MessageDirection;
pub use normalize::PieceStatus;
pub use normalize::normalize_campaign_status;
pub use normalize::normalize_lead_status;
pub use normalize::normalize_lob_event_type;
pub use normalize::normalize_message_direction;
pub use normalize::piece_status_for_event;
pub use payload::SchemaValidationError;
pub use payload::extract_campaign_id;
pub use payload::extract_campaign_status;
pub use payload::extract_event_type;
pub use payload::extract_lead_id;
pub use payload::extract_lead_status;
pub use payload::extract_lob_payload_version;
pub use payload::extract_lob_resource_id;
pub use payload::extract_message_id;
pub use payload::extract_sequence_step_number;
pub use payload::validate_lob_payload_schema;
pub use provider_error::ErrorCategory;
pub use provider_error::ProviderError;
pub use time::now_rfc3339;
pub use time::parse_rfc3339;
