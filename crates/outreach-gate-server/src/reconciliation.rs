// crates/outreach-gate-server/src/reconciliation.rs
// ============================================================================
// Module: Reconciliation Runner
// Description: Polls providers and converges local campaign/lead/message state.
// Purpose: Repair divergence the webhook stream missed.
// Dependencies: outreach-gate-core, outreach-gate-providers, serde_json
// ============================================================================

//! ## Overview
//! Reconciliation walks every eligible `(org, company, provider)` triple:
//! campaigns are listed from the provider (scoped by the tenant's provider
//! client id where applicable), diffed on name and normalized status, and
//! leads are upserted by external id. Message sync follows the provider's
//! configured mode: `webhook_only` skips polling and marks the campaign,
//! `pull_best_effort` lists messages and records `success` or
//! `partial_error` with the last error. Message upserts are per-row, not
//! transactional across a campaign; partial progress stays visible.
//!
//! Pollers come through a factory seam so tests can inject canned provider
//! state; production builds the real adapters per-tenant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use outreach_gate_config::MessageSyncMode;
use outreach_gate_core::CampaignId;
use outreach_gate_core::MessageSyncStatus;
use outreach_gate_core::ProviderConfig;
use outreach_gate_core::ProviderError;
use outreach_gate_core::normalize::normalize_campaign_status;
use outreach_gate_core::normalize::normalize_lead_status;
use outreach_gate_core::normalize::normalize_message_direction;
use outreach_gate_core::payload::extract_sequence_step_number;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_providers::EmailBisonClient;
use outreach_gate_providers::HeyReachClient;
use outreach_gate_providers::SmartleadClient;
use outreach_gate_store_sqlite::CampaignDiff;
use outreach_gate_store_sqlite::LeadUpsert;
use outreach_gate_store_sqlite::MessageUpsert;
use outreach_gate_store_sqlite::NewCampaign;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::api::ApiError;
use crate::auth::authenticate_super_admin;
use crate::auth::verify_scheduler_secret;
use crate::log::log_event;
use crate::server::GatewayState;
use crate::server::RequestId;
use crate::server::run_blocking;

// ============================================================================
// SECTION: Poller Seam
// ============================================================================

/// Read surface reconciliation needs from a provider.
pub trait ProviderPoller: Send + Sync {
    /// Lists campaigns, bounded by the run's campaign limit.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure.
    fn list_campaigns(&self, limit: u32) -> Result<Vec<Value>, ProviderError>;

    /// Lists leads within one campaign, bounded by the run's lead limit.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure.
    fn list_leads(&self, campaign_external_id: &str, limit: u32)
    -> Result<Vec<Value>, ProviderError>;

    /// Lists messages within one campaign, bounded by the message limit.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on call failure.
    fn list_messages(
        &self,
        campaign_external_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ProviderError>;
}

/// Factory building a poller for one `(provider, tenant credentials)` pair.
pub type PollerFactory = Arc<
    dyn Fn(&str, &ProviderConfig) -> Result<Box<dyn ProviderPoller>, ProviderError>
        + Send
        + Sync,
>;

/// Poller backed by the real provider adapters.
enum AdapterPoller {
    /// Smartlead adapter.
    Smartlead(SmartleadClient),
    /// HeyReach adapter.
    HeyReach(HeyReachClient),
    /// EmailBison adapter.
    EmailBison(EmailBisonClient),
}

impl ProviderPoller for AdapterPoller {
    fn list_campaigns(&self, limit: u32) -> Result<Vec<Value>, ProviderError> {
        match self {
            Self::Smartlead(client) => client.list_campaigns(limit, 0),
            Self::HeyReach(client) => {
                let mut campaigns = client.list_campaigns()?;
                campaigns.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                Ok(campaigns)
            }
            Self::EmailBison(client) => {
                let mut campaigns = client.list_campaigns()?;
                campaigns.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                Ok(campaigns)
            }
        }
    }

    fn list_leads(
        &self,
        campaign_external_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        match self {
            Self::Smartlead(client) => client.list_campaign_leads(campaign_external_id, limit, 0),
            Self::HeyReach(client) => {
                client.get_campaign_leads(campaign_external_id, 1, limit.min(1_000))
            }
            Self::EmailBison(client) => {
                let mut leads = client.list_leads(campaign_external_id)?;
                leads.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                Ok(leads)
            }
        }
    }

    fn list_messages(
        &self,
        campaign_external_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        match self {
            Self::HeyReach(client) => client.list_conversations(campaign_external_id, limit),
            Self::Smartlead(_) | Self::EmailBison(_) => Ok(Vec::new()),
        }
    }
}

/// Builds the production poller factory over the real adapters.
#[must_use]
pub fn adapter_poller_factory() -> PollerFactory {
    Arc::new(|provider_slug, config| {
        let poller = match provider_slug {
            "smartlead" => AdapterPoller::Smartlead(SmartleadClient::new(&config.api_key)?),
            "heyreach" => AdapterPoller::HeyReach(HeyReachClient::new(&config.api_key)?),
            "emailbison" => {
                let instance_url = config.instance_url.clone().unwrap_or_default();
                AdapterPoller::EmailBison(EmailBisonClient::new(&config.api_key, instance_url)?)
            }
            other => {
                return Err(ProviderError::terminal(
                    other,
                    "reconciliation",
                    "provider has no reconciliation poller",
                ));
            }
        };
        Ok(Box::new(poller) as Box<dyn ProviderPoller>)
    })
}

// ============================================================================
// SECTION: Request And Stats
// ============================================================================

/// Reconciliation run parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationRunRequest {
    /// Restrict to one provider; default runs the sequencer pair.
    pub provider_slug: Option<String>,
    /// Restrict to one organization.
    pub org_id: Option<String>,
    /// Restrict to one company.
    pub company_id: Option<String>,
    /// Report-only mode; defaults to true.
    pub dry_run: Option<bool>,
    /// Campaigns fetched per tenant (bounded to 1000).
    pub campaign_limit: Option<u32>,
    /// Leads fetched per campaign (bounded to 2000).
    pub lead_limit: Option<u32>,
    /// Whether message sync runs at all; defaults to true.
    pub sync_messages: Option<bool>,
    /// Messages fetched per campaign (bounded to 5000).
    pub message_limit: Option<u32>,
}

/// Per-provider reconciliation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    /// Provider the stats refer to.
    pub provider_slug: String,
    /// Entitled companies visited.
    pub companies_scanned: usize,
    /// Provider campaigns parsed.
    pub campaigns_scanned: usize,
    /// Campaigns absent locally.
    pub campaigns_created: usize,
    /// Campaigns whose name or status diverged.
    pub campaigns_updated: usize,
    /// Provider leads parsed.
    pub leads_scanned: usize,
    /// Leads absent locally.
    pub leads_created: usize,
    /// Leads whose fields diverged.
    pub leads_updated: usize,
    /// Provider messages parsed.
    pub messages_scanned: usize,
    /// Messages absent locally.
    pub messages_created: usize,
    /// Messages refreshed locally.
    pub messages_updated: usize,
    /// Non-fatal errors encountered.
    pub errors: Vec<String>,
}

impl ProviderStats {
    /// Builds an empty stats block for a provider.
    fn new(provider_slug: &str) -> Self {
        Self {
            provider_slug: provider_slug.to_string(),
            companies_scanned: 0,
            campaigns_scanned: 0,
            campaigns_created: 0,
            campaigns_updated: 0,
            leads_scanned: 0,
            leads_created: 0,
            leads_updated: 0,
            messages_scanned: 0,
            messages_created: 0,
            messages_updated: 0,
            errors: Vec::new(),
        }
    }
}

/// Providers reconciled when no explicit slug is given.
const DEFAULT_PROVIDERS: &[&str] = &["smartlead", "heyreach"];
/// Providers accepted for reconciliation runs.
const RECONCILABLE_PROVIDERS: &[&str] = &["smartlead", "heyreach", "emailbison"];

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs reconciliation and returns the response body.
///
/// # Errors
///
/// Returns [`ApiError`] for invalid providers or storage failures; per-
/// tenant provider failures are recorded in the stats instead.
pub fn run_reconciliation(
    state: &GatewayState,
    request: &ReconciliationRunRequest,
) -> Result<Value, ApiError> {
    let provider_slugs: Vec<String> = match &request.provider_slug {
        Some(slug) => {
            if !RECONCILABLE_PROVIDERS.contains(&slug.as_str()) {
                return Err(ApiError::bad_request("Unsupported provider"));
            }
            vec![slug.clone()]
        }
        None => DEFAULT_PROVIDERS.iter().map(|slug| (*slug).to_string()).collect(),
    };
    let dry_run = request.dry_run.unwrap_or(true);
    let campaign_limit = request.campaign_limit.unwrap_or(100).clamp(1, 1_000);
    let lead_limit = request.lead_limit.unwrap_or(500).clamp(1, 2_000);
    let sync_messages = request.sync_messages.unwrap_or(true);
    let message_limit = request.message_limit.unwrap_or(1_000).clamp(1, 5_000);

    let started_at = now_rfc3339();
    let mut provider_stats = Vec::new();
    for provider_slug in &provider_slugs {
        let provider = state.store.provider_by_slug(provider_slug)?.ok_or_else(|| {
            ApiError::message(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Provider not configured: {provider_slug}"),
            )
        })?;
        let mut stats = ProviderStats::new(provider_slug);
        let org_filter = request.org_id.as_deref().map(outreach_gate_core::OrgId::from);
        let company_filter =
            request.company_id.as_deref().map(outreach_gate_core::CompanyId::from);
        let entitlements = state.store.entitlements_for_provider(
            &provider.id,
            org_filter.as_ref(),
            company_filter.as_ref(),
        )?;
        for entitlement in entitlements {
            stats.companies_scanned += 1;
            let org_id = entitlement.org_id.clone();
            let company_id = entitlement.company_id.clone();
            let tenant_label = format!("{provider_slug}:{org_id}:{company_id}");
            let Some(config) = state.store.org_provider_config(&org_id, provider_slug)? else {
                stats.errors.push(format!("{tenant_label}: missing org api key"));
                continue;
            };
            let poller = match (state.pollers)(provider_slug, &config) {
                Ok(poller) => poller,
                Err(err) => {
                    stats.errors.push(format!("{tenant_label}: poller init failed: {err}"));
                    continue;
                }
            };
            let campaigns = match poller.list_campaigns(campaign_limit) {
                Ok(campaigns) => campaigns,
                Err(err) => {
                    stats.errors.push(format!("{tenant_label}: campaign fetch failed: {err}"));
                    continue;
                }
            };
            let client_id_filter = entitlement
                .provider_config
                .get("smartlead_client_id")
                .and_then(value_as_string);
            for provider_campaign in campaigns {
                if provider_slug == "smartlead"
                    && let Some(client_id) = &client_id_filter
                {
                    let campaign_client =
                        provider_campaign.get("client_id").and_then(value_as_string);
                    if campaign_client.is_some_and(|found| &found != client_id) {
                        continue;
                    }
                }
                let Some(parsed) = parse_provider_campaign(provider_slug, &provider_campaign)
                else {
                    continue;
                };
                stats.campaigns_scanned += 1;
                let existing = state.store.campaign_for_tenant(
                    &org_id,
                    &company_id,
                    &provider.id,
                    &parsed.external_campaign_id,
                )?;
                let campaign_id = if let Some(local) = existing {
                    if local.name != parsed.name || local.status != parsed.status {
                        stats.campaigns_updated += 1;
                        if !dry_run {
                            state.store.apply_campaign_diff(
                                &org_id,
                                &local.id,
                                &CampaignDiff {
                                    name: parsed.name.clone(),
                                    status: parsed.status,
                                    raw_payload: parsed.raw_payload.clone(),
                                },
                                &now_rfc3339(),
                            )?;
                        }
                    }
                    local.id
                } else {
                    stats.campaigns_created += 1;
                    if dry_run {
                        CampaignId::new(format!(
                            "dry-run-{provider_slug}-{}",
                            parsed.external_campaign_id
                        ))
                    } else {
                        state
                            .store
                            .insert_campaign(
                                &NewCampaign {
                                    org_id: org_id.clone(),
                                    company_id: company_id.clone(),
                                    provider_id: provider.id.clone(),
                                    external_campaign_id: parsed.external_campaign_id.clone(),
                                    name: parsed.name.clone(),
                                    status: parsed.status,
                                    created_by_user_id: None,
                                    raw_payload: parsed.raw_payload.clone(),
                                },
                                &now_rfc3339(),
                            )?
                            .id
                    }
                };

                let leads = match poller.list_leads(&parsed.external_campaign_id, lead_limit) {
                    Ok(leads) => leads,
                    Err(err) => {
                        stats.errors.push(format!(
                            "{tenant_label}:{}: lead fetch failed: {err}",
                            parsed.external_campaign_id
                        ));
                        continue;
                    }
                };
                for provider_lead in leads {
                    let Some(lead) = parse_provider_lead(&provider_lead) else {
                        continue;
                    };
                    stats.leads_scanned += 1;
                    let existing_lead = state.store.lead_by_external(
                        &org_id,
                        &campaign_id,
                        &lead.external_lead_id,
                    )?;
                    let diverged = existing_lead.as_ref().is_some_and(|local| {
                        local.status != lead.status
                            || local.email != lead.email
                            || local.first_name != lead.first_name
                            || local.last_name != lead.last_name
                    });
                    if existing_lead.is_some() {
                        if diverged {
                            stats.leads_updated += 1;
                        }
                    } else {
                        stats.leads_created += 1;
                    }
                    if !dry_run && (existing_lead.is_none() || diverged) {
                        state.store.upsert_lead(
                            &LeadUpsert {
                                org_id: org_id.clone(),
                                company_id: company_id.clone(),
                                company_campaign_id: campaign_id.clone(),
                                provider_id: provider.id.clone(),
                                external_lead_id: lead.external_lead_id.clone(),
                                email: lead.email.clone(),
                                first_name: lead.first_name.clone(),
                                last_name: lead.last_name.clone(),
                                status: lead.status,
                                raw_payload: lead.raw_payload.clone(),
                            },
                            &now_rfc3339(),
                        )?;
                    }
                }

                sync_campaign_messages(
                    state,
                    &mut stats,
                    poller.as_ref(),
                    provider_slug,
                    &org_id,
                    &company_id,
                    &provider.id,
                    &campaign_id,
                    &parsed.external_campaign_id,
                    dry_run,
                    sync_messages,
                    message_limit,
                    &tenant_label,
                )?;
            }
        }
        provider_stats.push(stats);
    }
    Ok(json!({
        "dry_run": dry_run,
        "started_at": started_at,
        "finished_at": now_rfc3339(),
        "providers": provider_stats,
    }))
}

/// Runs message sync for one campaign per the provider's configured mode.
#[allow(clippy::too_many_arguments, reason = "One call site; mirrors the runner's state.")]
fn sync_campaign_messages(
    state: &GatewayState,
    stats: &mut ProviderStats,
    poller: &dyn ProviderPoller,
    provider_slug: &str,
    org_id: &outreach_gate_core::OrgId,
    company_id: &outreach_gate_core::CompanyId,
    provider_id: &outreach_gate_core::ProviderId,
    campaign_id: &CampaignId,
    campaign_external_id: &str,
    dry_run: bool,
    sync_messages: bool,
    message_limit: u32,
    tenant_label: &str,
) -> Result<(), ApiError> {
    if !sync_messages || dry_run {
        return Ok(());
    }
    let mode = if provider_slug == "heyreach" {
        state.settings.heyreach_message_sync_mode
    } else {
        MessageSyncMode::WebhookOnly
    };
    if mode == MessageSyncMode::WebhookOnly {
        state.store.set_campaign_message_sync(
            org_id,
            campaign_id,
            MessageSyncStatus::SkippedWebhookOnly,
            None,
            &now_rfc3339(),
        )?;
        return Ok(());
    }
    let messages = match poller.list_messages(campaign_external_id, message_limit) {
        Ok(messages) => messages,
        Err(err) => {
            let detail = format!("{err} (category={})", err.category.as_str());
            state.store.set_campaign_message_sync(
                org_id,
                campaign_id,
                MessageSyncStatus::PartialError,
                Some(&detail),
                &now_rfc3339(),
            )?;
            stats
                .errors
                .push(format!("{tenant_label}:{campaign_external_id}: message fetch failed: {err}"));
            return Ok(());
        }
    };
    let mut last_row_error: Option<String> = None;
    for message in messages {
        let Some(external_message_id) =
            message.get("id").or_else(|| message.get("message_id")).and_then(value_as_string)
        else {
            continue;
        };
        stats.messages_scanned += 1;
        let direction = normalize_message_direction(
            message.get("direction").and_then(Value::as_str),
        );
        let upserted = state.store.upsert_message(
            &MessageUpsert {
                org_id: org_id.clone(),
                company_id: company_id.clone(),
                company_campaign_id: campaign_id.clone(),
                company_campaign_lead_id: None,
                provider_id: provider_id.clone(),
                external_message_id,
                direction,
                sequence_step_number: extract_sequence_step_number(&message),
                subject: message.get("subject").and_then(Value::as_str).map(str::to_string),
                body: message
                    .get("body")
                    .or_else(|| message.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                sent_at: message
                    .get("sent_at")
                    .or_else(|| message.get("created_at"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                raw_payload: message.clone(),
            },
            &now_rfc3339(),
        );
        match upserted {
            Ok(true) => stats.messages_created += 1,
            Ok(false) => stats.messages_updated += 1,
            Err(err) => last_row_error = Some(err.to_string()),
        }
    }
    if let Some(row_error) = last_row_error {
        state.store.set_campaign_message_sync(
            org_id,
            campaign_id,
            MessageSyncStatus::PartialError,
            Some(&row_error),
            &now_rfc3339(),
        )?;
        stats.errors.push(format!(
            "{tenant_label}:{campaign_external_id}: message upsert failed: {row_error}"
        ));
    } else {
        state.store.set_campaign_message_sync(
            org_id,
            campaign_id,
            MessageSyncStatus::Success,
            None,
            &now_rfc3339(),
        )?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Campaign fields parsed from a provider row.
struct ParsedCampaign {
    /// Provider-side campaign identifier.
    external_campaign_id: String,
    /// Display name with the provider fallback.
    name: String,
    /// Normalized status.
    status: outreach_gate_core::normalize::CampaignStatus,
    /// The raw provider row.
    raw_payload: Value,
}

/// Parses one provider campaign row; `None` when it carries no identity.
fn parse_provider_campaign(provider_slug: &str, campaign: &Value) -> Option<ParsedCampaign> {
    let external_id = campaign
        .get("id")
        .or_else(|| campaign.get("campaignId"))
        .or_else(|| campaign.get("campaign_id"))
        .and_then(value_as_string)?;
    let name = campaign
        .get("name")
        .or_else(|| campaign.get("campaign_name"))
        .and_then(Value::as_str)
        .map_or_else(
            || format!("{provider_slug}_campaign_{external_id}"),
            str::to_string,
        );
    Some(ParsedCampaign {
        external_campaign_id: external_id,
        name,
        status: normalize_campaign_status(campaign.get("status").and_then(Value::as_str)),
        raw_payload: campaign.clone(),
    })
}

/// Lead fields parsed from a provider row.
struct ParsedLead {
    /// Provider-side lead identifier.
    external_lead_id: String,
    /// Lead email address.
    email: Option<String>,
    /// Lead first name.
    first_name: Option<String>,
    /// Lead last name.
    last_name: Option<String>,
    /// Normalized status.
    status: outreach_gate_core::normalize::LeadStatus,
    /// The raw provider row.
    raw_payload: Value,
}

/// Parses one provider lead row; `None` when it carries no identity.
fn parse_provider_lead(lead: &Value) -> Option<ParsedLead> {
    let external_id = lead
        .get("id")
        .or_else(|| lead.get("lead_id"))
        .or_else(|| lead.get("leadId"))
        .and_then(value_as_string)?;
    Some(ParsedLead {
        external_lead_id: external_id,
        email: lead.get("email").and_then(Value::as_str).map(str::to_string),
        first_name: lead
            .get("first_name")
            .or_else(|| lead.get("firstName"))
            .and_then(Value::as_str)
            .map(str::to_string),
        last_name: lead
            .get("last_name")
            .or_else(|| lead.get("lastName"))
            .and_then(Value::as_str)
            .map(str::to_string),
        status: normalize_lead_status(lead.get("status").and_then(Value::as_str)),
        raw_payload: lead.clone(),
    })
}

/// Coerces a string or number field into a string.
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Runs reconciliation on demand (super-admin).
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure or an unrunnable request.
pub async fn run_reconciliation_endpoint(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ReconciliationRunRequest>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    let response = run_blocking(|| run_reconciliation(&state, &request))?;
    log_event(
        state.log.as_ref(),
        "reconciliation_completed",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!(request.provider_slug)),
            ("dry_run", json!(request.dry_run.unwrap_or(true))),
        ],
    );
    Ok(Json(response).into_response())
}

/// Runs reconciliation for an external scheduler (shared secret header).
///
/// # Errors
///
/// Returns 503 when the secret is unconfigured and 401 on mismatch.
pub async fn run_scheduled_endpoint(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ReconciliationRunRequest>,
) -> Result<Response, ApiError> {
    verify_scheduler_secret(state.settings.internal_scheduler_secret.as_deref(), &headers)?;
    let response = run_blocking(|| run_reconciliation(&state, &request))?;
    log_event(
        state.log.as_ref(),
        "reconciliation_scheduled_completed",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!(request.provider_slug)),
            ("dry_run", json!(request.dry_run.unwrap_or(true))),
        ],
    );
    Ok(Json(response).into_response())
}
