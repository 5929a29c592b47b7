// crates/outreach-gate-config/src/settings.rs
// ============================================================================
// Module: Gateway Settings
// Description: Canonical settings model resolved from environment keys.
// Purpose: Parse, default, and clamp every configuration knob in one place.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`GatewaySettings::from_env`] reads the documented env keys;
//! [`GatewaySettings::from_lookup`] takes any key-to-value function so tests
//! stay hermetic. Replay controls carry the clamping rules that keep bulk
//! replay bounded regardless of what operators put in the environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors that prevent the process from starting.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A structurally required key is absent.
    #[error("missing required setting: {0}")]
    MissingRequired(&'static str),
    /// A principal entry could not be parsed.
    #[error("invalid principal entry: {0}")]
    InvalidPrincipal(String),
}

// ============================================================================
// SECTION: Modes
// ============================================================================

/// Direct-mail signature verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobSignatureMode {
    /// Verification failures are audited; the request is still accepted.
    PermissiveAudit,
    /// Verification failures reject the request.
    Enforce,
}

impl LobSignatureMode {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PermissiveAudit => "permissive_audit",
            Self::Enforce => "enforce",
        }
    }

    /// Parses a mode string, falling back to the permissive default.
    #[must_use]
    fn parse(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("enforce") => Self::Enforce,
            _ => Self::PermissiveAudit,
        }
    }
}

/// Message synchronization mode for pull-capable providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSyncMode {
    /// Messages arrive via webhooks only; reconciliation skips them.
    WebhookOnly,
    /// Reconciliation also polls provider message endpoints.
    PullBestEffort,
}

impl MessageSyncMode {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebhookOnly => "webhook_only",
            Self::PullBestEffort => "pull_best_effort",
        }
    }

    /// Parses a mode string, falling back to webhook-only.
    #[must_use]
    fn parse(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("pull_best_effort") => Self::PullBestEffort,
            _ => Self::WebhookOnly,
        }
    }
}

// ============================================================================
// SECTION: Replay Controls
// ============================================================================

/// Bounded controls for bulk dead-letter replay.
///
/// # Invariants
/// - All values are clamped at construction; downstream code never re-checks
///   ranges.
/// - `queue_size >= workers`, `max_sleep_ms >= sleep_ms`,
///   `backoff_multiplier >= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayControls {
    /// Events per batch.
    pub batch_size: usize,
    /// Maximum events a single replay request may touch.
    pub max_events_per_run: usize,
    /// Baseline inter-batch sleep in milliseconds.
    pub sleep_ms: u64,
    /// Ceiling for the adaptive inter-batch sleep.
    pub max_sleep_ms: u64,
    /// Multiplier applied to the sleep after failed batches.
    pub backoff_multiplier: f64,
    /// Worker threads executing projections.
    pub workers: usize,
    /// In-flight cap for projection invocations.
    pub queue_size: usize,
}

impl ReplayControls {
    /// Builds replay controls from raw values, applying the clamping rules.
    #[must_use]
    pub fn clamped(
        batch_size: u64,
        max_events_per_run: u64,
        sleep_ms: u64,
        max_sleep_ms: u64,
        backoff_multiplier: f64,
        workers: u64,
        queue_size: u64,
    ) -> Self {
        let batch_size = usize_clamp(batch_size, 1, 200);
        let max_events_per_run = usize_clamp(max_events_per_run, 1, 5_000);
        let sleep_ms = sleep_ms.min(10_000);
        let max_sleep_ms = max_sleep_ms.clamp(sleep_ms, 30_000);
        let backoff_multiplier = if backoff_multiplier < 1.0 { 1.0 } else { backoff_multiplier };
        let workers_bound = workers.clamp(1, 32);
        Self {
            batch_size,
            max_events_per_run,
            sleep_ms,
            max_sleep_ms,
            backoff_multiplier,
            workers: usize_clamp(workers_bound, 1, 32),
            queue_size: usize_clamp(queue_size, workers_bound, 500),
        }
    }
}

impl Default for ReplayControls {
    fn default() -> Self {
        Self::clamped(25, 500, 50, 1_000, 2.0, 1, 1)
    }
}

/// Clamps a u64 into a usize range.
fn usize_clamp(value: u64, min: u64, max: u64) -> usize {
    usize::try_from(value.clamp(min, max)).unwrap_or(usize::MAX)
}

// ============================================================================
// SECTION: SLO Thresholds
// ============================================================================

/// Rate thresholds evaluated after every metrics persist.
///
/// # Invariants
/// - Negative values disable the corresponding check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SloThresholds {
    /// Signature rejections over deliveries received.
    pub signature_reject_rate: f64,
    /// Dead letters over deliveries accepted.
    pub dead_letter_rate: f64,
    /// Projection failures over deliveries accepted.
    pub projection_failure_rate: f64,
    /// Replay failures over replay attempts.
    pub replay_failure_rate: f64,
    /// Duplicates ignored over deliveries received.
    pub duplicate_ignore_rate: f64,
}

impl Default for SloThresholds {
    fn default() -> Self {
        Self {
            signature_reject_rate: -1.0,
            dead_letter_rate: -1.0,
            projection_failure_rate: -1.0,
            replay_failure_rate: -1.0,
            duplicate_ignore_rate: -1.0,
        }
    }
}

// ============================================================================
// SECTION: Export And Auth
// ============================================================================

/// Push sink for persisted metrics snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityExportSettings {
    /// Sink URL; export is disabled when absent.
    pub url: Option<String>,
    /// Bearer token attached to export requests.
    pub bearer_token: Option<String>,
    /// Export request timeout in seconds.
    pub timeout_seconds: f64,
}

/// One configured API principal: a bearer token bound to a tenant identity.
///
/// Entry wire form inside `GATEWAY_API_PRINCIPALS` (comma separated):
/// `token=org_id:user_id:role` or `token=org_id:user_id:role:company_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalSettings {
    /// Bearer token value.
    pub token: String,
    /// Organization the principal acts for.
    pub org_id: String,
    /// User identity.
    pub user_id: String,
    /// Role label (`org_admin`, `company_admin`, `company_member`).
    pub role: String,
    /// Company scope, absent for org-level principals.
    pub company_id: Option<String>,
}

/// Authentication material consumed by the auth middleware seam.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSettings {
    /// Super-admin bearer tokens.
    pub super_admin_tokens: Vec<String>,
    /// Tenant-scoped API principals.
    pub principals: Vec<PrincipalSettings>,
}

// ============================================================================
// SECTION: Gateway Settings
// ============================================================================

/// Complete gateway configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Bind address for the HTTP listener.
    pub bind: String,
    /// Path to the `SQLite` database file.
    pub db_path: Option<String>,
    /// Smartlead webhook HMAC secret; verification disabled when absent.
    pub smartlead_webhook_secret: Option<String>,
    /// HeyReach webhook HMAC secret; verification disabled when absent.
    pub heyreach_webhook_secret: Option<String>,
    /// Direct-mail webhook HMAC secret.
    pub lob_webhook_secret: Option<String>,
    /// Direct-mail signature verification mode.
    pub lob_signature_mode: LobSignatureMode,
    /// Accepted signature timestamp skew in seconds (0 disables the check).
    pub lob_signature_tolerance_seconds: i64,
    /// Supported direct-mail payload schema versions.
    pub lob_schema_versions: Vec<String>,
    /// Secret path token for the unsigned-origin ingest route.
    pub emailbison_path_token: Option<String>,
    /// Allowlisted origin hosts for the unsigned-origin route.
    pub emailbison_allowed_origins: Vec<String>,
    /// Bulk replay controls.
    pub replay: ReplayControls,
    /// SLO rate thresholds.
    pub slo: SloThresholds,
    /// Shared secret for the external reconciliation scheduler.
    pub internal_scheduler_secret: Option<String>,
    /// Metrics export sink.
    pub export: ObservabilityExportSettings,
    /// Message sync mode for the LinkedIn provider.
    pub heyreach_message_sync_mode: MessageSyncMode,
    /// Auth material for the bearer middleware seam.
    pub auth: AuthSettings,
}

impl GatewaySettings {
    /// Resolves settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a principal entry is malformed.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves settings through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a principal entry is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let replay = ReplayControls::clamped(
            u64_setting(&lookup, "LOB_WEBHOOK_REPLAY_BATCH_SIZE", 25),
            u64_setting(&lookup, "LOB_WEBHOOK_REPLAY_MAX_EVENTS_PER_RUN", 500),
            u64_setting(&lookup, "LOB_WEBHOOK_REPLAY_SLEEP_MS", 50),
            u64_setting(&lookup, "LOB_WEBHOOK_REPLAY_MAX_SLEEP_MS", 1_000),
            f64_setting(&lookup, "LOB_WEBHOOK_REPLAY_BACKOFF_MULTIPLIER", 2.0),
            u64_setting(&lookup, "LOB_WEBHOOK_REPLAY_MAX_CONCURRENT_WORKERS", 1),
            u64_setting(&lookup, "LOB_WEBHOOK_REPLAY_QUEUE_SIZE", 0),
        );
        let slo = SloThresholds {
            signature_reject_rate: f64_setting(
                &lookup,
                "LOB_SLO_SIGNATURE_REJECT_RATE_THRESHOLD",
                -1.0,
            ),
            dead_letter_rate: f64_setting(&lookup, "LOB_SLO_DEAD_LETTER_RATE_THRESHOLD", -1.0),
            projection_failure_rate: f64_setting(
                &lookup,
                "LOB_SLO_PROJECTION_FAILURE_RATE_THRESHOLD",
                -1.0,
            ),
            replay_failure_rate: f64_setting(
                &lookup,
                "LOB_SLO_REPLAY_FAILURE_RATE_THRESHOLD",
                -1.0,
            ),
            duplicate_ignore_rate: f64_setting(
                &lookup,
                "LOB_SLO_DUPLICATE_IGNORE_RATE_THRESHOLD",
                -1.0,
            ),
        };
        let export = ObservabilityExportSettings {
            url: non_empty(lookup("OBSERVABILITY_EXPORT_URL")),
            bearer_token: non_empty(lookup("OBSERVABILITY_EXPORT_BEARER_TOKEN")),
            timeout_seconds: f64_setting(&lookup, "OBSERVABILITY_EXPORT_TIMEOUT_SECONDS", 3.0)
                .max(0.1),
        };
        let auth = AuthSettings {
            super_admin_tokens: csv(lookup("GATEWAY_SUPER_ADMIN_TOKENS").as_deref()),
            principals: parse_principals(lookup("GATEWAY_API_PRINCIPALS").as_deref())?,
        };
        Ok(Self {
            bind: non_empty(lookup("GATEWAY_BIND"))
                .unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            db_path: non_empty(lookup("GATEWAY_DB_PATH")),
            smartlead_webhook_secret: non_empty(lookup("SMARTLEAD_WEBHOOK_SECRET")),
            heyreach_webhook_secret: non_empty(lookup("HEYREACH_WEBHOOK_SECRET")),
            lob_webhook_secret: non_empty(lookup("LOB_WEBHOOK_SECRET")),
            lob_signature_mode: LobSignatureMode::parse(
                lookup("LOB_WEBHOOK_SIGNATURE_MODE").as_deref(),
            ),
            lob_signature_tolerance_seconds: i64_setting(
                &lookup,
                "LOB_WEBHOOK_SIGNATURE_TOLERANCE_SECONDS",
                300,
            )
            .max(0),
            lob_schema_versions: schema_versions(
                lookup("LOB_WEBHOOK_SCHEMA_VERSIONS").as_deref(),
            ),
            emailbison_path_token: non_empty(lookup("EMAILBISON_WEBHOOK_PATH_TOKEN")),
            emailbison_allowed_origins: origin_hosts(
                lookup("EMAILBISON_WEBHOOK_ALLOWED_ORIGINS").as_deref(),
            ),
            replay,
            slo,
            internal_scheduler_secret: non_empty(lookup("INTERNAL_SCHEDULER_SECRET")),
            export,
            heyreach_message_sync_mode: MessageSyncMode::parse(
                lookup("HEYREACH_MESSAGE_SYNC_MODE").as_deref(),
            ),
            auth,
        })
    }

    /// Returns the database path or a hard configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingRequired`] when `GATEWAY_DB_PATH` is
    /// unset.
    pub fn require_db_path(&self) -> Result<&str, SettingsError> {
        self.db_path.as_deref().ok_or(SettingsError::MissingRequired("GATEWAY_DB_PATH"))
    }
}

// ============================================================================
// SECTION: Parse Helpers
// ============================================================================

/// Returns the value when present and non-empty after trimming.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|trimmed| !trimmed.is_empty())
}

/// Reads a u64 setting, falling back to the default on absence or junk.
fn u64_setting(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key).and_then(|raw| raw.trim().parse::<u64>().ok()).unwrap_or(default)
}

/// Reads an i64 setting, falling back to the default on absence or junk.
fn i64_setting(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: i64) -> i64 {
    lookup(key).and_then(|raw| raw.trim().parse::<i64>().ok()).unwrap_or(default)
}

/// Reads an f64 setting, falling back to the default on absence or junk.
fn f64_setting(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|parsed| parsed.is_finite())
        .unwrap_or(default)
}

/// Splits a comma-separated value into trimmed non-empty entries.
fn csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses supported schema versions, defaulting to `v1`.
fn schema_versions(value: Option<&str>) -> Vec<String> {
    let versions = csv(value);
    if versions.is_empty() { vec!["v1".to_string()] } else { versions }
}

/// Normalizes allowlisted origins to bare lowercase hosts.
fn origin_hosts(value: Option<&str>) -> Vec<String> {
    csv(value)
        .into_iter()
        .filter_map(|entry| {
            let without_scheme =
                entry.split_once("://").map_or(entry.as_str(), |(_, rest)| rest);
            let host = without_scheme
                .split('/')
                .next()
                .unwrap_or_default()
                .split(':')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if host.is_empty() { None } else { Some(host) }
        })
        .collect()
}

/// Parses the principal list from its compact env encoding.
fn parse_principals(value: Option<&str>) -> Result<Vec<PrincipalSettings>, SettingsError> {
    let mut principals = Vec::new();
    for entry in csv(value) {
        let Some((token, identity)) = entry.split_once('=') else {
            return Err(SettingsError::InvalidPrincipal(entry));
        };
        let parts: Vec<&str> = identity.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 || parts.iter().any(|part| part.is_empty()) {
            return Err(SettingsError::InvalidPrincipal(entry));
        }
        principals.push(PrincipalSettings {
            token: token.trim().to_string(),
            org_id: parts[0].to_string(),
            user_id: parts[1].to_string(),
            role: parts[2].to_string(),
            company_id: parts.get(3).map(|company| (*company).to_string()),
        });
    }
    Ok(principals)
}

#[cfg(test)]
mod tests;
