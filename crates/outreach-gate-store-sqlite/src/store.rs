// crates/outreach-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Gateway Store
// Description: Durable event store and domain tables backed by SQLite WAL.
// Purpose: Enforce idempotency and tenancy invariants at the storage layer.
// Dependencies: outreach-gate-core, rusqlite, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! One connection behind a mutex serves all reads and writes. The
//! `webhook_events` UNIQUE constraint over `(provider_slug, event_key)` is
//! the idempotency guard: concurrent deliveries of the same event serialize
//! here and the loser observes [`GatewayStoreError::DuplicateEvent`]. Domain
//! tables enforce their natural-key uniqueness with partial indexes over
//! live rows so soft-deleted history never blocks re-creation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use outreach_gate_core::Campaign;
use outreach_gate_core::CampaignId;
use outreach_gate_core::CampaignLead;
use outreach_gate_core::Capability;
use outreach_gate_core::CompanyId;
use outreach_gate_core::DirectMailPiece;
use outreach_gate_core::Entitlement;
use outreach_gate_core::EntitlementStatus;
use outreach_gate_core::EventId;
use outreach_gate_core::Inbox;
use outreach_gate_core::InboxId;
use outreach_gate_core::LeadId;
use outreach_gate_core::MessageSyncStatus;
use outreach_gate_core::MetricsSnapshot;
use outreach_gate_core::OrgId;
use outreach_gate_core::Organization;
use outreach_gate_core::PieceId;
use outreach_gate_core::PieceType;
use outreach_gate_core::Provider;
use outreach_gate_core::ProviderConfig;
use outreach_gate_core::ProviderId;
use outreach_gate_core::UserId;
use outreach_gate_core::WebhookEvent;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::normalize::CampaignStatus;
use outreach_gate_core::normalize::LeadStatus;
use outreach_gate_core::normalize::MessageDirection;
use outreach_gate_core::normalize::PieceStatus;
use outreach_gate_core::time::parse_rfc3339;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` gateway store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone)]
pub struct GatewayStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl GatewayStoreConfig {
    /// Builds a config for the given path with default timeouts.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` gateway store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw payloads.
#[derive(Debug, Error, Clone)]
pub enum GatewayStoreError {
    /// `SQLite` engine error.
    #[error("gateway store db error: {0}")]
    Db(String),
    /// An event with the same `(provider_slug, event_key)` already exists.
    #[error("duplicate webhook event: {provider_slug}/{event_key}")]
    DuplicateEvent {
        /// Provider slug of the colliding delivery.
        provider_slug: String,
        /// Event key of the colliding delivery.
        event_key: String,
    },
    /// A domain uniqueness constraint rejected the write.
    #[error("gateway store conflict: {0}")]
    Conflict(String),
    /// Stored data failed to parse back into domain types.
    #[error("gateway store invalid data: {0}")]
    Invalid(String),
}

/// Maps a rusqlite error onto the store error type.
fn map_db(err: rusqlite::Error) -> GatewayStoreError {
    GatewayStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Write Shapes
// ============================================================================

/// New webhook event row.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Provider slug the delivery arrived on.
    pub provider_slug: String,
    /// Provider-stable delivery identity.
    pub event_key: String,
    /// Raw or normalized event type label.
    pub event_type: String,
    /// Initial lifecycle status (`accepted` or `processed`).
    pub status: WebhookEventStatus,
    /// Opaque delivery payload.
    pub payload: Value,
    /// Resolved tenant organization, when known.
    pub org_id: Option<OrgId>,
    /// Resolved tenant company, when known.
    pub company_id: Option<CompanyId>,
    /// Ingest timestamp.
    pub created_at: String,
    /// Initial projection timestamp, when projected inline.
    pub processed_at: Option<String>,
}

/// Partial update applied to an existing event row.
///
/// # Invariants
/// - `last_error` distinguishes "leave unchanged" (`None`) from "clear"
///   (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    /// New lifecycle status.
    pub status: Option<WebhookEventStatus>,
    /// Replacement payload (stored whole, never merged).
    pub payload: Option<Value>,
    /// Last error update; `Some(None)` clears the column.
    pub last_error: Option<Option<String>>,
    /// New replay count.
    pub replay_count: Option<i64>,
    /// Last successful replay timestamp.
    pub last_replay_at: Option<String>,
    /// Resolved tenant organization.
    pub org_id: Option<OrgId>,
    /// Resolved tenant company.
    pub company_id: Option<CompanyId>,
    /// Projection attempt timestamp.
    pub processed_at: Option<String>,
}

/// Filtered event listing parameters.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to one provider slug.
    pub provider_slug: Option<String>,
    /// Restrict to one event type.
    pub event_type: Option<String>,
    /// Restrict to one organization.
    pub org_id: Option<OrgId>,
    /// Restrict to one company.
    pub company_id: Option<CompanyId>,
    /// Restrict to one lifecycle status.
    pub status: Option<WebhookEventStatus>,
    /// Inclusive lower bound on `created_at`.
    pub from_ts: Option<String>,
    /// Inclusive upper bound on `created_at`.
    pub to_ts: Option<String>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Rows skipped before returning.
    pub offset: usize,
}

/// New entitlement row.
#[derive(Debug, Clone)]
pub struct NewEntitlement {
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
    /// Provider-specific per-company settings.
    pub provider_config: Value,
}

/// New campaign row.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Provider the campaign lives on.
    pub provider_id: ProviderId,
    /// Provider-side campaign identifier.
    pub external_campaign_id: String,
    /// Campaign display name.
    pub name: String,
    /// Canonical status.
    pub status: CampaignStatus,
    /// Creating user, when created through a write service.
    pub created_by_user_id: Option<UserId>,
    /// Most recent provider view.
    pub raw_payload: Value,
}

/// Reconciliation diff applied to an existing campaign.
#[derive(Debug, Clone)]
pub struct CampaignDiff {
    /// New display name.
    pub name: String,
    /// New canonical status.
    pub status: CampaignStatus,
    /// New provider view.
    pub raw_payload: Value,
}

/// Lead upsert keyed by `(campaign, provider, external_lead_id)`.
#[derive(Debug, Clone)]
pub struct LeadUpsert {
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
    /// Most recent provider view.
    pub raw_payload: Value,
}

/// Message upsert keyed by `(campaign, provider, external_message_id)`.
#[derive(Debug, Clone)]
pub struct MessageUpsert {
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Enclosing campaign.
    pub company_campaign_id: CampaignId,
    /// Local lead, when resolved.
    pub company_campaign_lead_id: Option<LeadId>,
    /// Provider the message lives on.
    pub provider_id: ProviderId,
    /// Provider-side message identifier.
    pub external_message_id: String,
    /// Message direction.
    pub direction: MessageDirection,
    /// Sequence step that produced the message.
    pub sequence_step_number: Option<i64>,
    /// Message subject.
    pub subject: Option<String>,
    /// Message body text.
    pub body: Option<String>,
    /// Provider send timestamp.
    pub sent_at: Option<String>,
    /// Most recent provider view.
    pub raw_payload: Value,
}

/// New direct-mail piece row.
#[derive(Debug, Clone)]
pub struct NewPiece {
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
    /// Tenant metadata echoed by the provider.
    pub metadata: Option<Value>,
    /// Most recent provider view.
    pub raw_payload: Value,
}

/// Status update applied to an existing piece.
#[derive(Debug, Clone)]
pub struct PieceUpdate {
    /// New canonical status.
    pub status: PieceStatus,
    /// New scheduled send date.
    pub send_date: Option<String>,
    /// New tenant metadata.
    pub metadata: Option<Value>,
    /// New provider view.
    pub raw_payload: Value,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable gateway store over a single `SQLite` connection.
///
/// # Invariants
/// - All access serializes on the connection mutex.
/// - `(provider_slug, event_key)` uniqueness is enforced by the schema, not
///   by callers.
pub struct SqliteGatewayStore {
    /// Guarded database connection.
    connection: Mutex<Connection>,
}

impl SqliteGatewayStore {
    /// Opens the store, creating the schema when absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] when the database cannot be opened or
    /// the schema version mismatches.
    pub fn new(config: &GatewayStoreConfig) -> Result<Self, GatewayStoreError> {
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Runs a closure with the locked connection.
    fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, GatewayStoreError>,
    ) -> Result<T, GatewayStoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| GatewayStoreError::Db("connection lock poisoned".to_string()))?;
        op(&guard)
    }
}

// ============================================================================
// SECTION: Event Store Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Inserts a webhook event row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError::DuplicateEvent`] when the
    /// `(provider_slug, event_key)` pair already exists; the caller treats
    /// that as an idempotent accept.
    pub fn insert_event(&self, event: &NewEvent) -> Result<WebhookEvent, GatewayStoreError> {
        let id = new_id();
        let payload_text = json_text(&event.payload)?;
        self.with_conn(|conn| {
            let result = conn
                .prepare_cached(
                    "INSERT INTO webhook_events (id, provider_slug, event_key, event_type, \
                     status, payload, replay_count, last_replay_at, last_error, org_id, \
                     company_id, created_at, processed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, NULL, ?7, ?8, ?9, ?10)",
                )
                .map_err(map_db)?
                .execute(params![
                    id,
                    event.provider_slug,
                    event.event_key,
                    event.event_type,
                    event.status.as_str(),
                    payload_text,
                    event.org_id.as_ref().map(OrgId::as_str),
                    event.company_id.as_ref().map(CompanyId::as_str),
                    event.created_at,
                    event.processed_at,
                ]);
            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(GatewayStoreError::DuplicateEvent {
                        provider_slug: event.provider_slug.clone(),
                        event_key: event.event_key.clone(),
                    });
                }
                Err(err) => return Err(map_db(err)),
            }
            read_event(conn, &event.provider_slug, &event.event_key)?.ok_or_else(|| {
                GatewayStoreError::Db("inserted event row is missing".to_string())
            })
        })
    }

    /// Fetches an event by its `(provider_slug, event_key)` identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn get_event(
        &self,
        provider_slug: &str,
        event_key: &str,
    ) -> Result<Option<WebhookEvent>, GatewayStoreError> {
        self.with_conn(|conn| read_event(conn, provider_slug, event_key))
    }

    /// Applies a partial update to an event row.
    ///
    /// Returns the updated row, or `None` when no such event exists.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn update_event_by_key(
        &self,
        provider_slug: &str,
        event_key: &str,
        update: &EventUpdate,
    ) -> Result<Option<WebhookEvent>, GatewayStoreError> {
        self.with_conn(|conn| {
            let Some(current) = read_event(conn, provider_slug, event_key)? else {
                return Ok(None);
            };
            let status = update.status.unwrap_or(current.status);
            let payload_text = match &update.payload {
                Some(payload) => json_text(payload)?,
                None => json_text(&current.payload)?,
            };
            let last_error = match &update.last_error {
                Some(new_value) => new_value.clone(),
                None => current.last_error.clone(),
            };
            let replay_count = update.replay_count.unwrap_or(current.replay_count);
            let last_replay_at =
                update.last_replay_at.clone().or_else(|| current.last_replay_at.clone());
            let org_id = update.org_id.clone().or_else(|| current.org_id.clone());
            let company_id = update.company_id.clone().or_else(|| current.company_id.clone());
            let processed_at =
                update.processed_at.clone().or_else(|| current.processed_at.clone());
            conn.prepare_cached(
                "UPDATE webhook_events SET status = ?1, payload = ?2, last_error = ?3, \
                 replay_count = ?4, last_replay_at = ?5, org_id = ?6, company_id = ?7, \
                 processed_at = ?8
                 WHERE provider_slug = ?9 AND event_key = ?10",
            )
            .map_err(map_db)?
            .execute(params![
                status.as_str(),
                payload_text,
                last_error,
                replay_count,
                last_replay_at,
                org_id.as_ref().map(OrgId::as_str),
                company_id.as_ref().map(CompanyId::as_str),
                processed_at,
                provider_slug,
                event_key,
            ])
            .map_err(map_db)?;
            read_event(conn, provider_slug, event_key)
        })
    }

    /// Lists events matching the filter, newest first.
    ///
    /// Time-window bounds are compared on parsed timestamps so mixed
    /// subsecond precision cannot reorder the window.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn list_events(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<WebhookEvent>, GatewayStoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, provider_slug, event_key, event_type, status, payload, \
                     replay_count, last_replay_at, last_error, org_id, company_id, created_at, \
                     processed_at
                     FROM webhook_events ORDER BY created_at DESC, id DESC",
                )
                .map_err(map_db)?;
            let mapped = stmt
                .query_map(params![], event_row)
                .map_err(map_db)?
                .collect::<Result<Vec<EventRow>, _>>()
                .map_err(map_db)?;
            Ok(mapped)
        })?;
        let from_ts = filter.from_ts.as_deref().and_then(parse_rfc3339);
        let to_ts = filter.to_ts.as_deref().and_then(parse_rfc3339);
        let mut events = Vec::new();
        for row in rows {
            let event = event_from_row(row)?;
            if let Some(provider_slug) = &filter.provider_slug
                && &event.provider_slug != provider_slug
            {
                continue;
            }
            if let Some(event_type) = &filter.event_type
                && &event.event_type != event_type
            {
                continue;
            }
            if let Some(org_id) = &filter.org_id
                && event.org_id.as_ref() != Some(org_id)
            {
                continue;
            }
            if let Some(company_id) = &filter.company_id
                && event.company_id.as_ref() != Some(company_id)
            {
                continue;
            }
            if let Some(status) = filter.status
                && event.status != status
            {
                continue;
            }
            let created = parse_rfc3339(&event.created_at);
            if let (Some(from), Some(created)) = (from_ts, created)
                && created < from
            {
                continue;
            }
            if let (Some(to), Some(created)) = (to_ts, created)
                && created > to
            {
                continue;
            }
            events.push(event);
        }
        let bounded: Vec<WebhookEvent> =
            events.into_iter().skip(filter.offset).take(filter.limit.max(1)).collect();
        Ok(bounded)
    }
}

// ============================================================================
// SECTION: Tenancy Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Inserts an organization row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn insert_organization(
        &self,
        org: &Organization,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        let configs = serde_json::to_value(&org.provider_configs)
            .map_err(|err| GatewayStoreError::Invalid(err.to_string()))?;
        let configs_text = json_text(&configs)?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO organizations (id, slug, provider_configs, created_at, updated_at, \
                 deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?4, NULL)",
            )
            .map_err(map_db)?
            .execute(params![org.id.as_str(), org.slug, configs_text, now])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Returns the per-provider credentials for a live organization.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure or corrupt config.
    pub fn org_provider_config(
        &self,
        org_id: &OrgId,
        provider_slug: &str,
    ) -> Result<Option<ProviderConfig>, GatewayStoreError> {
        let configs_text: Option<String> = self.with_conn(|conn| {
            conn.prepare_cached(
                "SELECT provider_configs FROM organizations WHERE id = ?1 AND deleted_at IS NULL",
            )
            .map_err(map_db)?
            .query_row(params![org_id.as_str()], |row| row.get(0))
            .optional()
            .map_err(map_db)
        })?;
        let Some(configs_text) = configs_text else {
            return Ok(None);
        };
        let configs: BTreeMap<String, ProviderConfig> = serde_json::from_str(&configs_text)
            .map_err(|err| GatewayStoreError::Invalid(format!("provider_configs: {err}")))?;
        Ok(configs.get(provider_slug).cloned())
    }

    /// Inserts a company row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn insert_company(
        &self,
        org_id: &OrgId,
        company_id: &CompanyId,
        status: &str,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO companies (id, org_id, status, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?4, NULL)",
            )
            .map_err(map_db)?
            .execute(params![company_id.as_str(), org_id.as_str(), status, now])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Registers a provider row, returning the existing row when present.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn upsert_provider(
        &self,
        slug: &str,
        capability: Capability,
    ) -> Result<Provider, GatewayStoreError> {
        let id = new_id();
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO providers (id, slug, capability) VALUES (?1, ?2, ?3)",
            )
            .map_err(map_db)?
            .execute(params![id, slug, capability.as_str()])
            .map_err(map_db)?;
            read_provider(conn, "slug", slug)?
                .ok_or_else(|| GatewayStoreError::Db("provider row is missing".to_string()))
        })
    }

    /// Looks up a provider by slug.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn provider_by_slug(&self, slug: &str) -> Result<Option<Provider>, GatewayStoreError> {
        self.with_conn(|conn| read_provider(conn, "slug", slug))
    }

    /// Looks up a provider by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn provider_by_id(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<Provider>, GatewayStoreError> {
        self.with_conn(|conn| read_provider(conn, "id", provider_id.as_str()))
    }

    /// Inserts an entitlement row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError::Conflict`] when the company already has a
    /// live entitlement for the capability.
    pub fn insert_entitlement(
        &self,
        entitlement: &NewEntitlement,
        now: &str,
    ) -> Result<Entitlement, GatewayStoreError> {
        let id = new_id();
        let config_text = json_text(&entitlement.provider_config)?;
        self.with_conn(|conn| {
            let result = conn
                .prepare_cached(
                    "INSERT INTO company_entitlements (id, org_id, company_id, capability, \
                     provider_id, status, provider_config, created_at, updated_at, deleted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, NULL)",
                )
                .map_err(map_db)?
                .execute(params![
                    id,
                    entitlement.org_id.as_str(),
                    entitlement.company_id.as_str(),
                    entitlement.capability.as_str(),
                    entitlement.provider_id.as_str(),
                    entitlement.status.as_str(),
                    config_text,
                    now,
                ]);
            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(GatewayStoreError::Conflict(
                        "entitlement already exists for company capability".to_string(),
                    ));
                }
                Err(err) => return Err(map_db(err)),
            }
            Ok(Entitlement {
                id,
                org_id: entitlement.org_id.clone(),
                company_id: entitlement.company_id.clone(),
                capability: entitlement.capability,
                provider_id: entitlement.provider_id.clone(),
                status: entitlement.status,
                provider_config: entitlement.provider_config.clone(),
                deleted_at: None,
            })
        })
    }

    /// Lists live entitlements for a provider, optionally narrowed by tenant.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn entitlements_for_provider(
        &self,
        provider_id: &ProviderId,
        org_id: Option<&OrgId>,
        company_id: Option<&CompanyId>,
    ) -> Result<Vec<Entitlement>, GatewayStoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, org_id, company_id, capability, provider_id, status, \
                     provider_config, deleted_at
                     FROM company_entitlements
                     WHERE provider_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at ASC",
                )
                .map_err(map_db)?;
            let mapped = stmt
                .query_map(params![provider_id.as_str()], entitlement_row)
                .map_err(map_db)?
                .collect::<Result<Vec<EntitlementRow>, _>>()
                .map_err(map_db)?;
            Ok(mapped)
        })?;
        let mut entitlements = Vec::new();
        for row in rows {
            let entitlement = entitlement_from_row(row)?;
            if let Some(org_id) = org_id
                && &entitlement.org_id != org_id
            {
                continue;
            }
            if let Some(company_id) = company_id
                && &entitlement.company_id != company_id
            {
                continue;
            }
            entitlements.push(entitlement);
        }
        Ok(entitlements)
    }

    /// Finds the live entitlement wiring a company to a capability.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn entitlement_for_capability(
        &self,
        org_id: &OrgId,
        company_id: &CompanyId,
        capability: Capability,
    ) -> Result<Option<Entitlement>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(
                "SELECT id, org_id, company_id, capability, provider_id, status, \
                 provider_config, deleted_at
                 FROM company_entitlements
                 WHERE org_id = ?1 AND company_id = ?2 AND capability = ?3 \
                 AND deleted_at IS NULL",
            )
            .map_err(map_db)?
            .query_row(
                params![org_id.as_str(), company_id.as_str(), capability.as_str()],
                entitlement_row,
            )
            .optional()
            .map_err(map_db)
        })?;
        row.map(entitlement_from_row).transpose()
    }
}

// ============================================================================
// SECTION: Campaign Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Inserts a campaign row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError::Conflict`] when a live row already exists
    /// for `(provider_id, external_campaign_id)`.
    pub fn insert_campaign(
        &self,
        campaign: &NewCampaign,
        now: &str,
    ) -> Result<Campaign, GatewayStoreError> {
        let id = new_id();
        let payload_text = json_text(&campaign.raw_payload)?;
        self.with_conn(|conn| {
            let result = conn
                .prepare_cached(
                    "INSERT INTO company_campaigns (id, org_id, company_id, provider_id, \
                     external_campaign_id, name, status, created_by_user_id, raw_payload, \
                     message_sync_status, last_message_sync_error, created_at, updated_at, \
                     deleted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, ?10, ?10, NULL)",
                )
                .map_err(map_db)?
                .execute(params![
                    id,
                    campaign.org_id.as_str(),
                    campaign.company_id.as_str(),
                    campaign.provider_id.as_str(),
                    campaign.external_campaign_id,
                    campaign.name,
                    campaign.status.as_str(),
                    campaign.created_by_user_id.as_ref().map(UserId::as_str),
                    payload_text,
                    now,
                ]);
            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(GatewayStoreError::Conflict(
                        "campaign already exists for provider external id".to_string(),
                    ));
                }
                Err(err) => return Err(map_db(err)),
            }
            read_campaign_by_id(conn, &id)?
                .ok_or_else(|| GatewayStoreError::Db("inserted campaign is missing".to_string()))
        })
    }

    /// Resolves a live campaign by provider and external identifier.
    ///
    /// Used by webhook projection, where tenant scope is not yet known.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn campaign_by_provider_external(
        &self,
        provider_id: &ProviderId,
        external_campaign_id: &str,
    ) -> Result<Option<Campaign>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(&campaign_select(
                "WHERE provider_id = ?1 AND external_campaign_id = ?2 AND deleted_at IS NULL",
            ))
            .map_err(map_db)?
            .query_row(params![provider_id.as_str(), external_campaign_id], campaign_row)
            .optional()
            .map_err(map_db)
        })?;
        row.map(campaign_from_row).transpose()
    }

    /// Resolves a live campaign within an authenticated tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn campaign_by_id(
        &self,
        org_id: &OrgId,
        campaign_id: &CampaignId,
        company_id: Option<&CompanyId>,
    ) -> Result<Option<Campaign>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(&campaign_select(
                "WHERE id = ?1 AND org_id = ?2 AND deleted_at IS NULL",
            ))
            .map_err(map_db)?
            .query_row(params![campaign_id.as_str(), org_id.as_str()], campaign_row)
            .optional()
            .map_err(map_db)
        })?;
        let campaign = row.map(campaign_from_row).transpose()?;
        Ok(campaign.filter(|found| {
            company_id.is_none_or(|company| &found.company_id == company)
        }))
    }

    /// Resolves a live campaign for a reconciliation tenant triple.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn campaign_for_tenant(
        &self,
        org_id: &OrgId,
        company_id: &CompanyId,
        provider_id: &ProviderId,
        external_campaign_id: &str,
    ) -> Result<Option<Campaign>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(&campaign_select(
                "WHERE org_id = ?1 AND company_id = ?2 AND provider_id = ?3 \
                 AND external_campaign_id = ?4 AND deleted_at IS NULL",
            ))
            .map_err(map_db)?
            .query_row(
                params![
                    org_id.as_str(),
                    company_id.as_str(),
                    provider_id.as_str(),
                    external_campaign_id
                ],
                campaign_row,
            )
            .optional()
            .map_err(map_db)
        })?;
        row.map(campaign_from_row).transpose()
    }

    /// Applies a normalized status and fresh payload to a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn apply_campaign_status(
        &self,
        org_id: &OrgId,
        campaign_id: &CampaignId,
        status: CampaignStatus,
        raw_payload: &Value,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        let payload_text = json_text(raw_payload)?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE company_campaigns SET status = ?1, raw_payload = ?2, updated_at = ?3
                 WHERE id = ?4 AND org_id = ?5",
            )
            .map_err(map_db)?
            .execute(params![
                status.as_str(),
                payload_text,
                now,
                campaign_id.as_str(),
                org_id.as_str()
            ])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Applies a reconciliation diff (name, status, payload) to a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn apply_campaign_diff(
        &self,
        org_id: &OrgId,
        campaign_id: &CampaignId,
        diff: &CampaignDiff,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        let payload_text = json_text(&diff.raw_payload)?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE company_campaigns SET name = ?1, status = ?2, raw_payload = ?3, \
                 updated_at = ?4
                 WHERE id = ?5 AND org_id = ?6",
            )
            .map_err(map_db)?
            .execute(params![
                diff.name,
                diff.status.as_str(),
                payload_text,
                now,
                campaign_id.as_str(),
                org_id.as_str()
            ])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Records the message-sync outcome of a reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn set_campaign_message_sync(
        &self,
        org_id: &OrgId,
        campaign_id: &CampaignId,
        status: MessageSyncStatus,
        last_error: Option<&str>,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE company_campaigns SET message_sync_status = ?1, \
                 last_message_sync_error = ?2, updated_at = ?3
                 WHERE id = ?4 AND org_id = ?5",
            )
            .map_err(map_db)?
            .execute(params![
                status.as_str(),
                last_error,
                now,
                campaign_id.as_str(),
                org_id.as_str()
            ])
            .map_err(map_db)?;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: Lead Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Resolves a live lead within a campaign by external identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn lead_by_external(
        &self,
        org_id: &OrgId,
        campaign_id: &CampaignId,
        external_lead_id: &str,
    ) -> Result<Option<CampaignLead>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(&lead_select(
                "WHERE org_id = ?1 AND company_campaign_id = ?2 AND external_lead_id = ?3 \
                 AND deleted_at IS NULL",
            ))
            .map_err(map_db)?
            .query_row(
                params![org_id.as_str(), campaign_id.as_str(), external_lead_id],
                lead_row,
            )
            .optional()
            .map_err(map_db)
        })?;
        row.map(lead_from_row).transpose()
    }

    /// Applies a normalized status and fresh payload to a lead.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn apply_lead_status(
        &self,
        org_id: &OrgId,
        lead_id: &LeadId,
        status: LeadStatus,
        raw_payload: &Value,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        let payload_text = json_text(raw_payload)?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE company_campaign_leads SET status = ?1, raw_payload = ?2, \
                 updated_at = ?3
                 WHERE id = ?4 AND org_id = ?5",
            )
            .map_err(map_db)?
            .execute(params![
                status.as_str(),
                payload_text,
                now,
                lead_id.as_str(),
                org_id.as_str()
            ])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Upserts a lead by `(campaign, provider, external_lead_id)`.
    ///
    /// Returns the lead id and whether a row was created.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn upsert_lead(
        &self,
        lead: &LeadUpsert,
        now: &str,
    ) -> Result<(LeadId, bool), GatewayStoreError> {
        let payload_text = json_text(&lead.raw_payload)?;
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .prepare_cached(
                    "SELECT id FROM company_campaign_leads
                     WHERE org_id = ?1 AND company_campaign_id = ?2 AND provider_id = ?3 \
                     AND external_lead_id = ?4 AND deleted_at IS NULL",
                )
                .map_err(map_db)?
                .query_row(
                    params![
                        lead.org_id.as_str(),
                        lead.company_campaign_id.as_str(),
                        lead.provider_id.as_str(),
                        lead.external_lead_id
                    ],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_db)?;
            if let Some(id) = existing {
                conn.prepare_cached(
                    "UPDATE company_campaign_leads SET email = ?1, first_name = ?2, \
                     last_name = ?3, status = ?4, raw_payload = ?5, updated_at = ?6
                     WHERE id = ?7 AND org_id = ?8",
                )
                .map_err(map_db)?
                .execute(params![
                    lead.email,
                    lead.first_name,
                    lead.last_name,
                    lead.status.as_str(),
                    payload_text,
                    now,
                    id,
                    lead.org_id.as_str()
                ])
                .map_err(map_db)?;
                return Ok((LeadId::new(id), false));
            }
            let id = new_id();
            conn.prepare_cached(
                "INSERT INTO company_campaign_leads (id, org_id, company_id, \
                 company_campaign_id, provider_id, external_lead_id, email, first_name, \
                 last_name, status, raw_payload, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, NULL)",
            )
            .map_err(map_db)?
            .execute(params![
                id,
                lead.org_id.as_str(),
                lead.company_id.as_str(),
                lead.company_campaign_id.as_str(),
                lead.provider_id.as_str(),
                lead.external_lead_id,
                lead.email,
                lead.first_name,
                lead.last_name,
                lead.status.as_str(),
                payload_text,
                now,
            ])
            .map_err(map_db)?;
            Ok((LeadId::new(id), true))
        })
    }
}

// ============================================================================
// SECTION: Message Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Upserts a message by `(campaign, provider, external_message_id)`.
    ///
    /// Returns whether a row was created.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn upsert_message(
        &self,
        message: &MessageUpsert,
        now: &str,
    ) -> Result<bool, GatewayStoreError> {
        let payload_text = json_text(&message.raw_payload)?;
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .prepare_cached(
                    "SELECT id FROM company_campaign_messages
                     WHERE org_id = ?1 AND company_campaign_id = ?2 AND provider_id = ?3 \
                     AND external_message_id = ?4 AND deleted_at IS NULL",
                )
                .map_err(map_db)?
                .query_row(
                    params![
                        message.org_id.as_str(),
                        message.company_campaign_id.as_str(),
                        message.provider_id.as_str(),
                        message.external_message_id
                    ],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_db)?;
            if let Some(id) = existing {
                conn.prepare_cached(
                    "UPDATE company_campaign_messages SET company_campaign_lead_id = ?1, \
                     direction = ?2, sequence_step_number = ?3, subject = ?4, body = ?5, \
                     sent_at = ?6, raw_payload = ?7, updated_at = ?8
                     WHERE id = ?9 AND org_id = ?10",
                )
                .map_err(map_db)?
                .execute(params![
                    message.company_campaign_lead_id.as_ref().map(LeadId::as_str),
                    message.direction.as_str(),
                    message.sequence_step_number,
                    message.subject,
                    message.body,
                    message.sent_at,
                    payload_text,
                    now,
                    id,
                    message.org_id.as_str()
                ])
                .map_err(map_db)?;
                return Ok(false);
            }
            let id = new_id();
            conn.prepare_cached(
                "INSERT INTO company_campaign_messages (id, org_id, company_id, \
                 company_campaign_id, company_campaign_lead_id, provider_id, \
                 external_message_id, direction, sequence_step_number, subject, body, sent_at, \
                 raw_payload, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14, \
                 NULL)",
            )
            .map_err(map_db)?
            .execute(params![
                id,
                message.org_id.as_str(),
                message.company_id.as_str(),
                message.company_campaign_id.as_str(),
                message.company_campaign_lead_id.as_ref().map(LeadId::as_str),
                message.provider_id.as_str(),
                message.external_message_id,
                message.direction.as_str(),
                message.sequence_step_number,
                message.subject,
                message.body,
                message.sent_at,
                payload_text,
                now,
            ])
            .map_err(map_db)?;
            Ok(true)
        })
    }
}

// ============================================================================
// SECTION: Direct Mail Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Resolves a live piece by provider and external identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn piece_by_external(
        &self,
        provider_id: &ProviderId,
        external_piece_id: &str,
    ) -> Result<Option<DirectMailPiece>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(&piece_select(
                "WHERE provider_id = ?1 AND external_piece_id = ?2 AND deleted_at IS NULL",
            ))
            .map_err(map_db)?
            .query_row(params![provider_id.as_str(), external_piece_id], piece_row)
            .optional()
            .map_err(map_db)
        })?;
        row.map(piece_from_row).transpose()
    }

    /// Resolves a live piece within an authenticated tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn piece_by_id(
        &self,
        org_id: &OrgId,
        piece_id: &PieceId,
        company_id: Option<&CompanyId>,
    ) -> Result<Option<DirectMailPiece>, GatewayStoreError> {
        let row = self.with_conn(|conn| {
            conn.prepare_cached(&piece_select(
                "WHERE id = ?1 AND org_id = ?2 AND deleted_at IS NULL",
            ))
            .map_err(map_db)?
            .query_row(params![piece_id.as_str(), org_id.as_str()], piece_row)
            .optional()
            .map_err(map_db)
        })?;
        let piece = row.map(piece_from_row).transpose()?;
        Ok(piece.filter(|found| company_id.is_none_or(|company| &found.company_id == company)))
    }

    /// Applies a projection update to an existing piece.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn update_piece(
        &self,
        org_id: &OrgId,
        piece_id: &PieceId,
        update: &PieceUpdate,
        now: &str,
    ) -> Result<(), GatewayStoreError> {
        let payload_text = json_text(&update.raw_payload)?;
        let metadata_text = update.metadata.as_ref().map(json_text).transpose()?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE company_direct_mail_pieces SET status = ?1, send_date = ?2, \
                 metadata = ?3, raw_payload = ?4, updated_at = ?5
                 WHERE id = ?6 AND org_id = ?7",
            )
            .map_err(map_db)?
            .execute(params![
                update.status.as_str(),
                update.send_date,
                metadata_text,
                payload_text,
                now,
                piece_id.as_str(),
                org_id.as_str()
            ])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Inserts a direct-mail piece row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn insert_piece(
        &self,
        piece: &NewPiece,
        now: &str,
    ) -> Result<DirectMailPiece, GatewayStoreError> {
        let id = new_id();
        let payload_text = json_text(&piece.raw_payload)?;
        let metadata_text = piece.metadata.as_ref().map(json_text).transpose()?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO company_direct_mail_pieces (id, org_id, company_id, provider_id, \
                 external_piece_id, piece_type, status, send_date, metadata, raw_payload, \
                 created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, NULL)",
            )
            .map_err(map_db)?
            .execute(params![
                id,
                piece.org_id.as_str(),
                piece.company_id.as_str(),
                piece.provider_id.as_str(),
                piece.external_piece_id,
                piece.piece_type.as_str(),
                piece.status.as_str(),
                piece.send_date,
                metadata_text,
                payload_text,
                now,
            ])
            .map_err(map_db)?;
            read_piece_by_id(conn, &id)?
                .ok_or_else(|| GatewayStoreError::Db("inserted piece is missing".to_string()))
        })
    }
}

// ============================================================================
// SECTION: Inbox Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Upserts an inbox by `(org, provider, external_account_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn upsert_inbox(&self, inbox: &Inbox, now: &str) -> Result<(), GatewayStoreError> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .prepare_cached(
                    "SELECT id FROM company_inboxes
                     WHERE org_id = ?1 AND provider_id = ?2 AND external_account_id = ?3 \
                     AND deleted_at IS NULL",
                )
                .map_err(map_db)?
                .query_row(
                    params![
                        inbox.org_id.as_str(),
                        inbox.provider_id.as_str(),
                        inbox.external_account_id
                    ],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_db)?;
            if let Some(id) = existing {
                conn.prepare_cached(
                    "UPDATE company_inboxes SET email = ?1, status = ?2, warmup_enabled = ?3, \
                     updated_at = ?4
                     WHERE id = ?5 AND org_id = ?6",
                )
                .map_err(map_db)?
                .execute(params![
                    inbox.email,
                    inbox.status,
                    i64::from(inbox.warmup_enabled),
                    now,
                    id,
                    inbox.org_id.as_str()
                ])
                .map_err(map_db)?;
                return Ok(());
            }
            conn.prepare_cached(
                "INSERT INTO company_inboxes (id, org_id, company_id, provider_id, \
                 external_account_id, email, status, warmup_enabled, created_at, updated_at, \
                 deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, NULL)",
            )
            .map_err(map_db)?
            .execute(params![
                inbox.id.as_str(),
                inbox.org_id.as_str(),
                inbox.company_id.as_str(),
                inbox.provider_id.as_str(),
                inbox.external_account_id,
                inbox.email,
                inbox.status,
                i64::from(inbox.warmup_enabled),
                now,
            ])
            .map_err(map_db)?;
            Ok(())
        })
    }

    /// Lists live inboxes within a tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn list_inboxes(
        &self,
        org_id: &OrgId,
        company_id: Option<&CompanyId>,
    ) -> Result<Vec<Inbox>, GatewayStoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, org_id, company_id, provider_id, external_account_id, email, \
                     status, warmup_enabled, deleted_at
                     FROM company_inboxes WHERE org_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at ASC",
                )
                .map_err(map_db)?;
            let mapped = stmt
                .query_map(params![org_id.as_str()], inbox_row)
                .map_err(map_db)?
                .collect::<Result<Vec<Inbox>, _>>()
                .map_err(map_db)?;
            Ok(mapped)
        })?;
        Ok(rows
            .into_iter()
            .filter(|inbox| company_id.is_none_or(|company| &inbox.company_id == company))
            .collect())
    }
}

// ============================================================================
// SECTION: Metrics Snapshot Operations
// ============================================================================

impl SqliteGatewayStore {
    /// Persists a counter snapshot row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn insert_metrics_snapshot(
        &self,
        source: &str,
        request_id: Option<&str>,
        counters: &BTreeMap<String, i64>,
        now: &str,
    ) -> Result<String, GatewayStoreError> {
        let id = new_id();
        let counters_value = serde_json::to_value(counters)
            .map_err(|err| GatewayStoreError::Invalid(err.to_string()))?;
        let counters_text = json_text(&counters_value)?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO observability_metric_snapshots (id, source, request_id, counters, \
                 created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(map_db)?
            .execute(params![id, source, request_id, counters_text, now])
            .map_err(map_db)?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Lists persisted snapshots, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayStoreError`] on database failure.
    pub fn list_metrics_snapshots(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MetricsSnapshot>, GatewayStoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, source, request_id, counters, created_at
                     FROM observability_metric_snapshots
                     ORDER BY created_at DESC, id DESC",
                )
                .map_err(map_db)?;
            let mapped = stmt
                .query_map(params![], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(map_db)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_db)?;
            Ok(mapped)
        })?;
        let mut snapshots = Vec::new();
        for (id, source, request_id, counters_text, created_at) in
            rows.into_iter().skip(offset).take(limit.max(1))
        {
            let counters: BTreeMap<String, i64> = serde_json::from_str(&counters_text)
                .map_err(|err| GatewayStoreError::Invalid(format!("counters: {err}")))?;
            snapshots.push(MetricsSnapshot {
                id,
                source,
                request_id,
                counters,
                created_at,
            });
        }
        Ok(snapshots)
    }
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Opens an `SQLite` connection with durability defaults.
fn open_connection(config: &GatewayStoreConfig) -> Result<Connection, GatewayStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(map_db)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(map_db)?;
    connection.execute_batch("PRAGMA journal_mode = wal;").map_err(map_db)?;
    connection.execute_batch("PRAGMA synchronous = normal;").map_err(map_db)?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(map_db)?;
    Ok(connection)
}

/// Initializes the schema or validates the stored version.
fn initialize_schema(connection: &mut Connection) -> Result<(), GatewayStoreError> {
    let tx = connection.transaction().map_err(map_db)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(map_db)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(map_db)?;
    match version {
        None => {
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS organizations (
                     id TEXT PRIMARY KEY,
                     slug TEXT NOT NULL,
                     provider_configs TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE TABLE IF NOT EXISTS companies (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     status TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE TABLE IF NOT EXISTS providers (
                     id TEXT PRIMARY KEY,
                     slug TEXT NOT NULL UNIQUE,
                     capability TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS company_entitlements (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     company_id TEXT NOT NULL,
                     capability TEXT NOT NULL,
                     provider_id TEXT NOT NULL,
                     status TEXT NOT NULL,
                     provider_config TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_entitlements_company_capability
                     ON company_entitlements (company_id, capability)
                     WHERE deleted_at IS NULL;
                 CREATE TABLE IF NOT EXISTS company_campaigns (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     company_id TEXT NOT NULL,
                     provider_id TEXT NOT NULL,
                     external_campaign_id TEXT NOT NULL,
                     name TEXT NOT NULL,
                     status TEXT NOT NULL,
                     created_by_user_id TEXT,
                     raw_payload TEXT NOT NULL,
                     message_sync_status TEXT,
                     last_message_sync_error TEXT,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_campaigns_provider_external
                     ON company_campaigns (provider_id, external_campaign_id)
                     WHERE deleted_at IS NULL;
                 CREATE TABLE IF NOT EXISTS company_campaign_leads (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     company_id TEXT NOT NULL,
                     company_campaign_id TEXT NOT NULL,
                     provider_id TEXT NOT NULL,
                     external_lead_id TEXT NOT NULL,
                     email TEXT,
                     first_name TEXT,
                     last_name TEXT,
                     status TEXT NOT NULL,
                     raw_payload TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_leads_campaign_provider_external
                     ON company_campaign_leads (company_campaign_id, provider_id, \
                     external_lead_id)
                     WHERE deleted_at IS NULL;
                 CREATE TABLE IF NOT EXISTS company_campaign_messages (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     company_id TEXT NOT NULL,
                     company_campaign_id TEXT NOT NULL,
                     company_campaign_lead_id TEXT,
                     provider_id TEXT NOT NULL,
                     external_message_id TEXT NOT NULL,
                     direction TEXT NOT NULL,
                     sequence_step_number INTEGER,
                     subject TEXT,
                     body TEXT,
                     sent_at TEXT,
                     raw_payload TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_campaign_provider_external
                     ON company_campaign_messages (company_campaign_id, provider_id, \
                     external_message_id)
                     WHERE deleted_at IS NULL;
                 CREATE TABLE IF NOT EXISTS company_direct_mail_pieces (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     company_id TEXT NOT NULL,
                     provider_id TEXT NOT NULL,
                     external_piece_id TEXT NOT NULL,
                     piece_type TEXT NOT NULL,
                     status TEXT NOT NULL,
                     send_date TEXT,
                     metadata TEXT,
                     raw_payload TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_pieces_provider_external
                     ON company_direct_mail_pieces (provider_id, external_piece_id)
                     WHERE deleted_at IS NULL;
                 CREATE TABLE IF NOT EXISTS company_inboxes (
                     id TEXT PRIMARY KEY,
                     org_id TEXT NOT NULL,
                     company_id TEXT NOT NULL,
                     provider_id TEXT NOT NULL,
                     external_account_id TEXT NOT NULL,
                     email TEXT NOT NULL,
                     status TEXT NOT NULL,
                     warmup_enabled INTEGER NOT NULL DEFAULT 0,
                     created_at TEXT NOT NULL,
                     updated_at TEXT NOT NULL,
                     deleted_at TEXT
                 );
                 CREATE TABLE IF NOT EXISTS webhook_events (
                     id TEXT PRIMARY KEY,
                     provider_slug TEXT NOT NULL,
                     event_key TEXT NOT NULL,
                     event_type TEXT NOT NULL,
                     status TEXT NOT NULL,
                     payload TEXT NOT NULL,
                     replay_count INTEGER NOT NULL DEFAULT 0,
                     last_replay_at TEXT,
                     last_error TEXT,
                     org_id TEXT,
                     company_id TEXT,
                     created_at TEXT NOT NULL,
                     processed_at TEXT,
                     UNIQUE (provider_slug, event_key)
                 );
                 CREATE INDEX IF NOT EXISTS idx_webhook_events_created
                     ON webhook_events (created_at DESC);
                 CREATE TABLE IF NOT EXISTS observability_metric_snapshots (
                     id TEXT PRIMARY KEY,
                     source TEXT NOT NULL,
                     request_id TEXT,
                     counters TEXT NOT NULL,
                     created_at TEXT NOT NULL
                 );",
            )
            .map_err(map_db)?;
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(map_db)?;
        }
        Some(found) if found == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(GatewayStoreError::Invalid(format!(
                "schema version mismatch: found {found}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(map_db)
}

/// Generates a new UUID row identifier.
fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serializes a JSON value to column text.
fn json_text(value: &Value) -> Result<String, GatewayStoreError> {
    serde_json::to_string(value).map_err(|err| GatewayStoreError::Invalid(err.to_string()))
}

/// Parses column text back into a JSON value.
fn json_value(text: &str) -> Result<Value, GatewayStoreError> {
    serde_json::from_str(text).map_err(|err| GatewayStoreError::Invalid(err.to_string()))
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw column tuple for a webhook event row.
type EventRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
);

/// Maps a result row into the raw event tuple.
fn event_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

/// Converts the raw event tuple into the domain record.
fn event_from_row(row: EventRow) -> Result<WebhookEvent, GatewayStoreError> {
    let (
        id,
        provider_slug,
        event_key,
        event_type,
        status_text,
        payload_text,
        replay_count,
        last_replay_at,
        last_error,
        org_id,
        company_id,
        created_at,
        processed_at,
    ) = row;
    let status = WebhookEventStatus::parse(&status_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("event status: {status_text}")))?;
    Ok(WebhookEvent {
        id: EventId::new(id),
        provider_slug,
        event_key,
        event_type,
        status,
        payload: json_value(&payload_text)?,
        replay_count,
        last_replay_at,
        last_error,
        org_id: org_id.map(OrgId::new),
        company_id: company_id.map(CompanyId::new),
        created_at,
        processed_at,
    })
}

/// Reads one event by its natural key.
fn read_event(
    conn: &Connection,
    provider_slug: &str,
    event_key: &str,
) -> Result<Option<WebhookEvent>, GatewayStoreError> {
    let row = conn
        .prepare_cached(
            "SELECT id, provider_slug, event_key, event_type, status, payload, replay_count, \
             last_replay_at, last_error, org_id, company_id, created_at, processed_at
             FROM webhook_events WHERE provider_slug = ?1 AND event_key = ?2",
        )
        .map_err(map_db)?
        .query_row(params![provider_slug, event_key], event_row)
        .optional()
        .map_err(map_db)?;
    row.map(event_from_row).transpose()
}

/// Reads one provider by a literal column predicate.
fn read_provider(
    conn: &Connection,
    column: &str,
    value: &str,
) -> Result<Option<Provider>, GatewayStoreError> {
    let sql = format!("SELECT id, slug, capability FROM providers WHERE {column} = ?1");
    let row: Option<(String, String, String)> = conn
        .prepare_cached(&sql)
        .map_err(map_db)?
        .query_row(params![value], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .optional()
        .map_err(map_db)?;
    let Some((id, slug, capability_text)) = row else {
        return Ok(None);
    };
    let capability = Capability::parse(&capability_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("capability: {capability_text}")))?;
    Ok(Some(Provider {
        id: ProviderId::new(id),
        slug,
        capability,
    }))
}

/// Raw column tuple for an entitlement row.
type EntitlementRow =
    (String, String, String, String, String, String, String, Option<String>);

/// Maps a result row into the raw entitlement tuple.
fn entitlement_row(row: &Row<'_>) -> rusqlite::Result<EntitlementRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// Converts the raw entitlement tuple into the domain record.
fn entitlement_from_row(row: EntitlementRow) -> Result<Entitlement, GatewayStoreError> {
    let (id, org_id, company_id, capability_text, provider_id, status_text, config_text, deleted_at) =
        row;
    let capability = Capability::parse(&capability_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("capability: {capability_text}")))?;
    let status = EntitlementStatus::parse(&status_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("entitlement status: {status_text}")))?;
    Ok(Entitlement {
        id,
        org_id: OrgId::new(org_id),
        company_id: CompanyId::new(company_id),
        capability,
        provider_id: ProviderId::new(provider_id),
        status,
        provider_config: json_value(&config_text)?,
        deleted_at,
    })
}

/// Shared SELECT column list for campaign queries.
fn campaign_select(where_clause: &str) -> String {
    format!(
        "SELECT id, org_id, company_id, provider_id, external_campaign_id, name, status, \
         created_by_user_id, raw_payload, message_sync_status, last_message_sync_error, \
         deleted_at
         FROM company_campaigns {where_clause}"
    )
}

/// Raw column tuple for a campaign row.
type CampaignRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Maps a result row into the raw campaign tuple.
fn campaign_row(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

/// Converts the raw campaign tuple into the domain record.
fn campaign_from_row(row: CampaignRow) -> Result<Campaign, GatewayStoreError> {
    let (
        id,
        org_id,
        company_id,
        provider_id,
        external_campaign_id,
        name,
        status_text,
        created_by_user_id,
        payload_text,
        sync_text,
        last_message_sync_error,
        deleted_at,
    ) = row;
    let status = CampaignStatus::parse(&status_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("campaign status: {status_text}")))?;
    let message_sync_status = sync_text
        .as_deref()
        .map(|text| {
            MessageSyncStatus::parse(text).ok_or_else(|| {
                GatewayStoreError::Invalid(format!("message sync status: {text}"))
            })
        })
        .transpose()?;
    Ok(Campaign {
        id: CampaignId::new(id),
        org_id: OrgId::new(org_id),
        company_id: CompanyId::new(company_id),
        provider_id: ProviderId::new(provider_id),
        external_campaign_id,
        name,
        status,
        created_by_user_id: created_by_user_id.map(UserId::new),
        raw_payload: json_value(&payload_text)?,
        message_sync_status,
        last_message_sync_error,
        deleted_at,
    })
}

/// Reads one campaign by primary key.
fn read_campaign_by_id(
    conn: &Connection,
    id: &str,
) -> Result<Option<Campaign>, GatewayStoreError> {
    let row = conn
        .prepare_cached(&campaign_select("WHERE id = ?1"))
        .map_err(map_db)?
        .query_row(params![id], campaign_row)
        .optional()
        .map_err(map_db)?;
    row.map(campaign_from_row).transpose()
}

/// Shared SELECT column list for lead queries.
fn lead_select(where_clause: &str) -> String {
    format!(
        "SELECT id, org_id, company_id, company_campaign_id, provider_id, external_lead_id, \
         email, first_name, last_name, status, raw_payload, deleted_at
         FROM company_campaign_leads {where_clause}"
    )
}

/// Raw column tuple for a lead row.
type LeadRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    Option<String>,
);

/// Maps a result row into the raw lead tuple.
fn lead_row(row: &Row<'_>) -> rusqlite::Result<LeadRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

/// Converts the raw lead tuple into the domain record.
fn lead_from_row(row: LeadRow) -> Result<CampaignLead, GatewayStoreError> {
    let (
        id,
        org_id,
        company_id,
        company_campaign_id,
        provider_id,
        external_lead_id,
        email,
        first_name,
        last_name,
        status_text,
        payload_text,
        deleted_at,
    ) = row;
    let status = LeadStatus::parse(&status_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("lead status: {status_text}")))?;
    Ok(CampaignLead {
        id: LeadId::new(id),
        org_id: OrgId::new(org_id),
        company_id: CompanyId::new(company_id),
        company_campaign_id: CampaignId::new(company_campaign_id),
        provider_id: ProviderId::new(provider_id),
        external_lead_id,
        email,
        first_name,
        last_name,
        status,
        raw_payload: json_value(&payload_text)?,
        deleted_at,
    })
}

/// Shared SELECT column list for piece queries.
fn piece_select(where_clause: &str) -> String {
    format!(
        "SELECT id, org_id, company_id, provider_id, external_piece_id, piece_type, status, \
         send_date, metadata, raw_payload, deleted_at
         FROM company_direct_mail_pieces {where_clause}"
    )
}

/// Raw column tuple for a piece row.
type PieceRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
);

/// Maps a result row into the raw piece tuple.
fn piece_row(row: &Row<'_>) -> rusqlite::Result<PieceRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

/// Converts the raw piece tuple into the domain record.
fn piece_from_row(row: PieceRow) -> Result<DirectMailPiece, GatewayStoreError> {
    let (
        id,
        org_id,
        company_id,
        provider_id,
        external_piece_id,
        type_text,
        status_text,
        send_date,
        metadata_text,
        payload_text,
        deleted_at,
    ) = row;
    let piece_type = PieceType::parse(&type_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("piece type: {type_text}")))?;
    let status = PieceStatus::parse(&status_text)
        .ok_or_else(|| GatewayStoreError::Invalid(format!("piece status: {status_text}")))?;
    let metadata = metadata_text.as_deref().map(json_value).transpose()?;
    Ok(DirectMailPiece {
        id: PieceId::new(id),
        org_id: OrgId::new(org_id),
        company_id: CompanyId::new(company_id),
        provider_id: ProviderId::new(provider_id),
        external_piece_id,
        piece_type,
        status,
        send_date,
        metadata,
        raw_payload: json_value(&payload_text)?,
        deleted_at,
    })
}

/// Reads one piece by primary key.
fn read_piece_by_id(
    conn: &Connection,
    id: &str,
) -> Result<Option<DirectMailPiece>, GatewayStoreError> {
    let row = conn
        .prepare_cached(&piece_select("WHERE id = ?1"))
        .map_err(map_db)?
        .query_row(params![id], piece_row)
        .optional()
        .map_err(map_db)?;
    row.map(piece_from_row).transpose()
}

/// Maps a result row into an inbox record.
fn inbox_row(row: &Row<'_>) -> rusqlite::Result<Inbox> {
    Ok(Inbox {
        id: InboxId::new(row.get::<_, String>(0)?),
        org_id: OrgId::new(row.get::<_, String>(1)?),
        company_id: CompanyId::new(row.get::<_, String>(2)?),
        provider_id: ProviderId::new(row.get::<_, String>(3)?),
        external_account_id: row.get(4)?,
        email: row.get(5)?,
        status: row.get(6)?,
        warmup_enabled: row.get::<_, i64>(7)? != 0,
        deleted_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests;
