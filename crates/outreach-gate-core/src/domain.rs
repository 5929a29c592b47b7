// crates/outreach-gate-core/src/domain.rs
// ============================================================================
// Module: Outreach Gate Domain Records
// Description: Tenant-scoped entity records persisted by the gateway.
// Purpose: Define the canonical row shapes shared by store and server.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! These records mirror the relational tables one to one. Every tenant-scoped
//! row carries `org_id` alongside its own predicate; the storage layer never
//! queries without it. `raw_payload` fields always hold the most recent
//! provider view of the record, never a merge of historical payloads. Rows
//! are soft-deleted via `deleted_at`; live-row queries filter on it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::CampaignId;
use crate::ids::CompanyId;
use crate::ids::EventId;
use crate::ids::InboxId;
use crate::ids::LeadId;
use crate::ids::MessageId;
use crate::ids::OrgId;
use crate::ids::PieceId;
use crate::ids::ProviderId;
use crate::ids::UserId;
use crate::normalize::CampaignStatus;
use crate::normalize::LeadStatus;
use crate::normalize::MessageDirection;
use crate::normalize::PieceStatus;

// ============================================================================
// SECTION: Tenancy
// ============================================================================

/// Per-provider credentials stored on the organization row.
///
/// # Invariants
/// - Credentials are tenant-level, never per-user.
/// - `instance_url` is set only for providers with per-tenant deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the provider.
    pub api_key: String,
    /// Optional per-tenant deployment base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
    /// Optional provider-specific tenant identifier (e.g. a client id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Organization: the tenancy root that owns every other record.
///
/// # Invariants
/// - `provider_configs` is the single source of tenant credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: OrgId,
    /// URL-safe organization slug.
    pub slug: String,
    /// Provider slug to credentials map.
    pub provider_configs: BTreeMap<String, ProviderConfig>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

/// Company owned by exactly one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Company identifier.
    pub id: CompanyId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Free-form company status label.
    pub status: String,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

// ============================================================================
// SECTION: Capabilities And Providers
// ============================================================================

/// Coarse feature area a tenant can be entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Sequenced email outreach.
    EmailOutreach,
    /// LinkedIn outreach.
    LinkedinOutreach,
    /// Physical direct mail.
    DirectMail,
}

impl Capability {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailOutreach => "email_outreach",
            Self::LinkedinOutreach => "linkedin_outreach",
            Self::DirectMail => "direct_mail",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email_outreach" => Some(Self::EmailOutreach),
            "linkedin_outreach" => Some(Self::LinkedinOutreach),
            "direct_mail" => Some(Self::DirectMail),
            _ => None,
        }
    }
}

/// Configured provider row: one vendor fulfilling exactly one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Provider identifier.
    pub id: ProviderId,
    /// Stable provider slug (`smartlead`, `heyreach`, `emailbison`, `lob`).
    pub slug: String,
    /// Capability this provider fulfils.
    pub capability: Capability,
}

/// Entitlement connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// Entitled but not yet wired to the provider.
    Entitled,
    /// Wired and usable.
    Connected,
    /// Explicitly disconnected.
    Disconnected,
}

impl EntitlementStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entitled => "entitled",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entitled" => Some(Self::Entitled),
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }
}

/// Wiring of one company to one provider for one capability.
///
/// # Invariants
/// - At most one entitlement per `(company, capability)`.
/// - Provider choice for a capability is decided here, never per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    /// Entitlement identifier.
    pub id: String,
    /// Owning organization.
    pub org_id: OrgId,
    /// Entitled company.
    pub company_id: CompanyId,
    /// Capability granted.
    pub capability: Capability,
    /// Provider fulfilling the capability.
    pub provider_id: ProviderId,
    /// Connection state.
    pub status: EntitlementStatus,
    /// Provider-specific per-company settings (opaque).
    pub provider_config: Value,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

// ============================================================================
// SECTION: Campaign Records
// ============================================================================

/// Message-sync outcome recorded by the reconciliation runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSyncStatus {
    /// Messages synced cleanly on the last run.
    Success,
    /// Some message upserts failed; partial progress was kept.
    PartialError,
    /// Provider is webhook-only; polling is intentionally skipped.
    SkippedWebhookOnly,
}

impl MessageSyncStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialError => "partial_error",
            Self::SkippedWebhookOnly => "skipped_webhook_only",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "partial_error" => Some(Self::PartialError),
            "skipped_webhook_only" => Some(Self::SkippedWebhookOnly),
            _ => None,
        }
    }
}

/// Campaign projected from provider state.
///
/// # Invariants
/// - `(provider_id, external_campaign_id)` is unique among live rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign identifier.
    pub id: CampaignId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company; must agree with the company's organization.
    pub company_id: CompanyId,
    /// Provider the campaign lives on.
    pub provider_id: ProviderId,
    /// Provider-side campaign identifier.
    pub external_campaign_id: String,
    /// Campaign display name.
    pub name: String,
    /// Canonical status.
    pub status: CampaignStatus,
    /// User who created the campaign, when created locally.
    pub created_by_user_id: Option<UserId>,
    /// Most recent provider view of the campaign.
    pub raw_payload: Value,
    /// Last reconciliation message-sync outcome.
    pub message_sync_status: Option<MessageSyncStatus>,
    /// Last message-sync error text, when the outcome was partial.
    pub last_message_sync_error: Option<String>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

/// Lead enrolled in a campaign.
///
/// # Invariants
/// - Unique per `(campaign, provider, external_lead_id)` among live rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignLead {
    /// Lead identifier.
    pub id: LeadId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Enclosing campaign.
    pub company_campaign_id: CampaignId,
    /// Provider the lead lives on.
    pub provider_id: ProviderId,
    /// Provider-side lead identifier.
    pub external_lead_id: String,
    /// Lead email address.
    pub email: Option<String>,
    /// Lead first name.
    pub first_name: Option<String>,
    /// Lead last name.
    pub last_name: Option<String>,
    /// Canonical status.
    pub status: LeadStatus,
    /// Most recent provider view of the lead.
    pub raw_payload: Value,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

/// Message exchanged within a campaign.
///
/// # Invariants
/// - Unique per `(campaign, provider, external_message_id)` among live rows.
/// - `sequence_step_number` is 1-based when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Enclosing campaign.
    pub company_campaign_id: CampaignId,
    /// Local lead the message belongs to, when resolved.
    pub company_campaign_lead_id: Option<LeadId>,
    /// Provider the message lives on.
    pub provider_id: ProviderId,
    /// Provider-side message identifier.
    pub external_message_id: String,
    /// Message direction.
    pub direction: MessageDirection,
    /// Sequence step that produced the message, when known.
    pub sequence_step_number: Option<i64>,
    /// Message subject.
    pub subject: Option<String>,
    /// Message body text.
    pub body: Option<String>,
    /// Provider send timestamp.
    pub sent_at: Option<String>,
    /// Most recent provider view of the message.
    pub raw_payload: Value,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

// ============================================================================
// SECTION: Direct Mail And Inboxes
// ============================================================================

/// Physical mail piece format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceType {
    /// Postcard.
    Postcard,
    /// Letter.
    Letter,
    /// Self mailer.
    SelfMailer,
    /// Check.
    Check,
}

impl PieceType {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postcard => "postcard",
            Self::Letter => "letter",
            Self::SelfMailer => "self_mailer",
            Self::Check => "check",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "postcard" => Some(Self::Postcard),
            "letter" => Some(Self::Letter),
            "self_mailer" => Some(Self::SelfMailer),
            "check" => Some(Self::Check),
            _ => None,
        }
    }

    /// Infers a piece type from a provider resource-type hint.
    #[must_use]
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        let lower = resource_type.to_ascii_lowercase();
        if lower.contains("postcard") {
            Some(Self::Postcard)
        } else if lower.contains("letter") {
            Some(Self::Letter)
        } else if lower.contains("self_mailer") || lower.contains("self mailer") {
            Some(Self::SelfMailer)
        } else if lower.contains("check") {
            Some(Self::Check)
        } else {
            None
        }
    }
}

/// Direct-mail piece tracked against a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMailPiece {
    /// Piece identifier.
    pub id: PieceId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Producing provider.
    pub provider_id: ProviderId,
    /// Provider-side piece identifier.
    pub external_piece_id: String,
    /// Physical format.
    pub piece_type: PieceType,
    /// Canonical status.
    pub status: PieceStatus,
    /// Scheduled send date.
    pub send_date: Option<String>,
    /// Tenant-supplied metadata echoed by the provider.
    pub metadata: Option<Value>,
    /// Most recent provider view of the piece.
    pub raw_payload: Value,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

/// Sender inbox (email account) connected through a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    /// Inbox identifier.
    pub id: InboxId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Provider the account lives on.
    pub provider_id: ProviderId,
    /// Provider-side account identifier.
    pub external_account_id: String,
    /// Account email address.
    pub email: String,
    /// Free-form account status label.
    pub status: String,
    /// Whether warmup is enabled.
    pub warmup_enabled: bool,
    /// Soft-delete timestamp.
    pub deleted_at: Option<String>,
}

// ============================================================================
// SECTION: Event Store Records
// ============================================================================

/// Lifecycle of a stored webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    /// Accepted for deferred projection.
    Accepted,
    /// Projected successfully.
    Processed,
    /// Re-projected successfully by the replay controller.
    Replayed,
    /// Projection failed without dead-letter routing.
    Failed,
    /// Projection failed and the event was dead-lettered.
    DeadLetter,
}

impl WebhookEventStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Processed => "processed",
            Self::Replayed => "replayed",
            Self::Failed => "failed",
            Self::DeadLetter => "dead_letter",
        }
    }

    /// Parses a stored label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Self::Accepted),
            "processed" => Some(Self::Processed),
            "replayed" => Some(Self::Replayed),
            "failed" => Some(Self::Failed),
            "dead_letter" => Some(Self::DeadLetter),
            _ => None,
        }
    }
}

/// Stored webhook event: the append-only idempotency record.
///
/// # Invariants
/// - `(provider_slug, event_key)` is unique; the storage layer guards it.
/// - `payload` may carry reserved `_ingestion`, `_schema_validation`, and
///   `_dead_letter` sub-records; domain fields are never written into them.
/// - Rows are mutated only by the projection engine, the replay controller,
///   and the dead-letter recorder; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event row identifier.
    pub id: EventId,
    /// Provider slug the delivery arrived on.
    pub provider_slug: String,
    /// Provider-stable delivery identity.
    pub event_key: String,
    /// Raw or normalized event type label.
    pub event_type: String,
    /// Lifecycle status.
    pub status: WebhookEventStatus,
    /// Opaque delivery payload plus reserved sub-records.
    pub payload: Value,
    /// Number of successful replays.
    pub replay_count: i64,
    /// Timestamp of the last successful replay.
    pub last_replay_at: Option<String>,
    /// Last projection or replay error.
    pub last_error: Option<String>,
    /// Resolved tenant organization, when scoping hints matched.
    pub org_id: Option<OrgId>,
    /// Resolved tenant company, when scoping hints matched.
    pub company_id: Option<CompanyId>,
    /// Ingest timestamp.
    pub created_at: String,
    /// Last projection attempt timestamp.
    pub processed_at: Option<String>,
}

impl WebhookEvent {
    /// Returns the `_dead_letter` sub-record when one is present.
    #[must_use]
    pub fn dead_letter_meta(&self) -> Option<&Value> {
        self.payload.as_object().and_then(|map| map.get("_dead_letter"))
    }

    /// Returns true when this event is visible to the dead-letter surface.
    ///
    /// Replayed events keep their `_dead_letter` sub-record, so they remain
    /// inspectable after recovery.
    #[must_use]
    pub fn is_dead_letter(&self) -> bool {
        matches!(self.status, WebhookEventStatus::DeadLetter) || self.dead_letter_meta().is_some()
    }
}

/// Persisted counter snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Snapshot identifier.
    pub id: String,
    /// Label for the code path that persisted the snapshot.
    pub source: String,
    /// Request id active when the snapshot was taken, when any.
    pub request_id: Option<String>,
    /// Counter map keyed by `<name>|<sorted k=v labels>`.
    pub counters: BTreeMap<String, i64>,
    /// Persist timestamp.
    pub created_at: String,
}
