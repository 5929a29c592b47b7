// crates/outreach-gate-server/src/writes.rs
// ============================================================================
// Module: Domain Write Services
// Description: Tenant mutations that dispatch to providers and update rows.
// Purpose: Keep user-driven writes on one authorize/dispatch/upsert pattern.
// Dependencies: axum, outreach-gate-core, outreach-gate-providers
// ============================================================================

//! ## Overview
//! Every write follows the same pattern: authorize and resolve the company
//! scope, resolve the entitlement and its provider, load tenant credentials
//! from the organization row (never cached), dispatch through the provider
//! adapter and its error envelope, then upsert local rows and bump metrics.
//! A capability/provider pairing a route cannot drive answers 501 with an
//! explicit `provider_not_implemented` detail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use outreach_gate_core::Campaign;
use outreach_gate_core::CampaignId;
use outreach_gate_core::Capability;
use outreach_gate_core::CompanyId;
use outreach_gate_core::Entitlement;
use outreach_gate_core::Inbox;
use outreach_gate_core::InboxId;
use outreach_gate_core::PieceId;
use outreach_gate_core::PieceType;
use outreach_gate_core::ProviderConfig;
use outreach_gate_core::normalize::CampaignStatus;
use outreach_gate_core::normalize::LeadStatus;
use outreach_gate_core::normalize::PieceStatus;
use outreach_gate_core::normalize::normalize_campaign_status;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_providers::EmailBisonClient;
use outreach_gate_providers::HeyReachClient;
use outreach_gate_providers::IdempotencyMaterial;
use outreach_gate_providers::LobClient;
use outreach_gate_providers::SmartleadClient;
use outreach_gate_store_sqlite::LeadUpsert;
use outreach_gate_store_sqlite::NewCampaign;
use outreach_gate_store_sqlite::NewPiece;
use outreach_gate_store_sqlite::PieceUpdate;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use uuid::Uuid;

use crate::api::ApiError;
use crate::auth::AuthContext;
use crate::auth::authenticate;
use crate::log::log_event;
use crate::scope::resolve_company_scope;
use crate::server::GatewayState;
use crate::server::RequestId;
use crate::server::run_blocking;

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Builds the 501 body for an unroutable capability/provider pairing.
fn provider_not_implemented(capability: Capability, provider_slug: &str) -> ApiError {
    ApiError::new(
        StatusCode::NOT_IMPLEMENTED,
        json!({
            "type": "provider_not_implemented",
            "capability": capability.as_str(),
            "provider": provider_slug,
        }),
    )
}

/// Loads tenant credentials for a provider from the organization row.
fn org_credentials(
    state: &GatewayState,
    auth: &AuthContext,
    provider_slug: &str,
) -> Result<ProviderConfig, ApiError> {
    state
        .store
        .org_provider_config(&auth.org_id, provider_slug)?
        .ok_or_else(|| {
            ApiError::bad_request(format!("Missing org-level {provider_slug} API key"))
        })
}

/// Resolves the live entitlement for a capability within the scope.
fn entitlement_for(
    state: &GatewayState,
    auth: &AuthContext,
    company_id: &CompanyId,
    capability: Capability,
) -> Result<(Entitlement, String), ApiError> {
    let entitlement = state
        .store
        .entitlement_for_capability(&auth.org_id, company_id, capability)?
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "No entitlement wired for {}",
                capability.as_str()
            ))
        })?;
    let provider = state
        .store
        .provider_by_id(&entitlement.provider_id)?
        .ok_or_else(|| {
            ApiError::message(StatusCode::INTERNAL_SERVER_ERROR, "Provider not configured")
        })?;
    Ok((entitlement, provider.slug))
}

/// Loads a campaign visible to the caller, or 404.
fn campaign_for_auth(
    state: &GatewayState,
    auth: &AuthContext,
    campaign_id: &CampaignId,
) -> Result<Campaign, ApiError> {
    state
        .store
        .campaign_by_id(&auth.org_id, campaign_id, auth.company_id.as_ref())?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

/// Coerces a provider response field into a string identifier.
fn response_id(payload: &Value) -> Option<String> {
    match payload.get("id") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

// ============================================================================
// SECTION: Campaign Writes
// ============================================================================

/// Body for campaign creation.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    /// Target company for org-level callers.
    pub company_id: Option<String>,
    /// Campaign display name.
    pub name: String,
    /// Capability the campaign runs under.
    pub capability: String,
}

/// Creates a campaign on the entitled provider and locally.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern.
pub async fn create_campaign(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<CreateCampaignRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let requested = body.company_id.clone().map(CompanyId::new);
    let scope = resolve_company_scope(&auth, requested.as_ref(), false, false)?;
    let Some(company_id) = scope.company_filter().cloned() else {
        return Err(ApiError::bad_request("company_id is required"));
    };
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Campaign name is required"));
    }
    let capability = Capability::parse(&body.capability)
        .filter(|parsed| !matches!(parsed, Capability::DirectMail))
        .ok_or_else(|| ApiError::bad_request("Unsupported capability for campaigns"))?;

    let campaign = run_blocking(|| -> Result<Campaign, ApiError> {
        let (entitlement, provider_slug) = entitlement_for(&state, &auth, &company_id, capability)?;
        let config = org_credentials(&state, &auth, &provider_slug)?;
        let created: Value = match provider_slug.as_str() {
            "smartlead" => {
                let client = SmartleadClient::new(&config.api_key)
                    .map_err(|err| ApiError::from_provider(&err))?;
                let client_id = entitlement
                    .provider_config
                    .get("smartlead_client_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                client
                    .create_campaign(&body.name, client_id.as_deref())
                    .map_err(|err| ApiError::from_provider(&err))?
            }
            "emailbison" => {
                let instance_url = config.instance_url.clone().unwrap_or_default();
                let client = EmailBisonClient::new(&config.api_key, instance_url)
                    .map_err(|err| ApiError::from_provider(&err))?;
                client.create_campaign(&body.name).map_err(|err| ApiError::from_provider(&err))?
            }
            "heyreach" => {
                let client = HeyReachClient::new(&config.api_key)
                    .map_err(|err| ApiError::from_provider(&err))?;
                client.create_campaign(&body.name).map_err(|err| ApiError::from_provider(&err))?
            }
            other => return Err(provider_not_implemented(capability, other)),
        };
        let external_campaign_id = response_id(&created)
            .ok_or_else(|| ApiError::bad_request("Provider returned no campaign id"))?;
        let campaign = state.store.insert_campaign(
            &NewCampaign {
                org_id: auth.org_id.clone(),
                company_id: company_id.clone(),
                provider_id: entitlement.provider_id.clone(),
                external_campaign_id,
                name: body.name.clone(),
                status: CampaignStatus::Drafted,
                created_by_user_id: Some(auth.user_id.clone()),
                raw_payload: created,
            },
            &now_rfc3339(),
        )?;
        state.metrics.incr("campaigns.created", &[("provider_slug", &provider_slug)]);
        Ok(campaign)
    })?;
    log_event(
        state.log.as_ref(),
        "campaign_created",
        Some(request_id.as_str()),
        &[
            ("campaign_id", json!(campaign.id)),
            ("external_campaign_id", json!(campaign.external_campaign_id)),
        ],
    );
    Ok(Json(json!({
        "id": campaign.id,
        "external_campaign_id": campaign.external_campaign_id,
        "name": campaign.name,
        "status": campaign.status,
    }))
    .into_response())
}

/// Body for campaign status updates.
#[derive(Debug, Deserialize)]
pub struct UpdateCampaignStatusRequest {
    /// Requested provider status value.
    pub status: String,
}

/// Updates a campaign's status on the provider and locally.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern.
pub async fn update_campaign_status(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(campaign_id): Path<String>,
    Json(body): Json<UpdateCampaignStatusRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let campaign_id = CampaignId::new(campaign_id);
    let normalized = normalize_campaign_status(Some(&body.status));
    let campaign = run_blocking(|| -> Result<Campaign, ApiError> {
        let campaign = campaign_for_auth(&state, &auth, &campaign_id)?;
        let provider = state
            .store
            .provider_by_id(&campaign.provider_id)?
            .ok_or_else(|| {
                ApiError::message(StatusCode::INTERNAL_SERVER_ERROR, "Provider not configured")
            })?;
        let config = org_credentials(&state, &auth, &provider.slug)?;
        let updated: Value = match provider.slug.as_str() {
            "smartlead" => {
                let client = SmartleadClient::new(&config.api_key)
                    .map_err(|err| ApiError::from_provider(&err))?;
                client
                    .update_campaign_status(&campaign.external_campaign_id, &body.status)
                    .map_err(|err| ApiError::from_provider(&err))?
            }
            "emailbison" => {
                let instance_url = config.instance_url.clone().unwrap_or_default();
                let client = EmailBisonClient::new(&config.api_key, instance_url)
                    .map_err(|err| ApiError::from_provider(&err))?;
                client
                    .update_campaign_status(&campaign.external_campaign_id, &body.status)
                    .map_err(|err| ApiError::from_provider(&err))?
            }
            "heyreach" => {
                let client = HeyReachClient::new(&config.api_key)
                    .map_err(|err| ApiError::from_provider(&err))?;
                let result = if normalized == CampaignStatus::Paused {
                    client.pause_campaign(&campaign.external_campaign_id)
                } else {
                    client.resume_campaign(&campaign.external_campaign_id)
                };
                result.map_err(|err| ApiError::from_provider(&err))?
            }
            other => {
                return Err(provider_not_implemented(provider.capability, other));
            }
        };
        state.store.apply_campaign_status(
            &auth.org_id,
            &campaign.id,
            normalized,
            &updated,
            &now_rfc3339(),
        )?;
        state.metrics.incr("campaigns.status_updated", &[("provider_slug", &provider.slug)]);
        Ok(campaign)
    })?;
    Ok(Json(json!({
        "id": campaign.id,
        "status": normalized,
    }))
    .into_response())
}

/// Body for lead addition.
#[derive(Debug, Deserialize)]
pub struct AddLeadsRequest {
    /// Provider-shaped lead objects.
    pub leads: Vec<Value>,
}

/// Adds leads to a campaign on the provider and locally.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern.
pub async fn add_campaign_leads(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(campaign_id): Path<String>,
    Json(body): Json<AddLeadsRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    if body.leads.is_empty() {
        return Err(ApiError::bad_request("leads cannot be empty"));
    }
    let campaign_id = CampaignId::new(campaign_id);
    let added = run_blocking(|| -> Result<usize, ApiError> {
        let campaign = campaign_for_auth(&state, &auth, &campaign_id)?;
        let provider = state
            .store
            .provider_by_id(&campaign.provider_id)?
            .ok_or_else(|| {
                ApiError::message(StatusCode::INTERNAL_SERVER_ERROR, "Provider not configured")
            })?;
        let config = org_credentials(&state, &auth, &provider.slug)?;
        match provider.slug.as_str() {
            "smartlead" => {
                let client = SmartleadClient::new(&config.api_key)
                    .map_err(|err| ApiError::from_provider(&err))?;
                client
                    .add_campaign_leads(&campaign.external_campaign_id, &body.leads)
                    .map_err(|err| ApiError::from_provider(&err))?;
            }
            "emailbison" => {
                let instance_url = config.instance_url.clone().unwrap_or_default();
                let client = EmailBisonClient::new(&config.api_key, instance_url)
                    .map_err(|err| ApiError::from_provider(&err))?;
                client
                    .add_leads(&campaign.external_campaign_id, &body.leads)
                    .map_err(|err| ApiError::from_provider(&err))?;
            }
            other => {
                return Err(provider_not_implemented(provider.capability, other));
            }
        }
        let now = now_rfc3339();
        let mut added = 0_usize;
        for lead in &body.leads {
            let external_lead_id = response_id(lead).or_else(|| {
                lead.get("email").and_then(Value::as_str).map(str::to_string)
            });
            let Some(external_lead_id) = external_lead_id else {
                continue;
            };
            state.store.upsert_lead(
                &LeadUpsert {
                    org_id: campaign.org_id.clone(),
                    company_id: campaign.company_id.clone(),
                    company_campaign_id: campaign.id.clone(),
                    provider_id: campaign.provider_id.clone(),
                    external_lead_id,
                    email: lead.get("email").and_then(Value::as_str).map(str::to_string),
                    first_name: lead
                        .get("first_name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    last_name: lead
                        .get("last_name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    status: LeadStatus::Pending,
                    raw_payload: lead.clone(),
                },
                &now,
            )?;
            added += 1;
        }
        state.metrics.incr_by(
            "leads.added",
            &[("provider_slug", &provider.slug)],
            i64::try_from(added).unwrap_or(i64::MAX),
        );
        Ok(added)
    })?;
    Ok(Json(json!({"added": added})).into_response())
}

// ============================================================================
// SECTION: Direct Mail Writes
// ============================================================================

/// Body for direct-mail piece creation.
#[derive(Debug, Deserialize)]
pub struct CreatePieceRequest {
    /// Target company for org-level callers.
    pub company_id: Option<String>,
    /// Physical format (`postcard` or `letter`).
    pub piece_type: String,
    /// Provider-shaped creation payload.
    pub payload: Value,
    /// Idempotency key forwarded to the producer.
    pub idempotency_key: Option<String>,
    /// Carry the key as a query parameter instead of a header.
    pub idempotency_in_query: Option<bool>,
}

/// Builds the idempotency material from request fields.
fn idempotency_from_request(
    key: Option<&str>,
    in_query: bool,
) -> IdempotencyMaterial {
    key.map_or_else(IdempotencyMaterial::default, |key| {
        if in_query {
            IdempotencyMaterial::query(key)
        } else {
            IdempotencyMaterial::header(key)
        }
    })
}

/// Creates a direct-mail piece with the producer and locally.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern.
pub async fn create_direct_mail_piece(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<CreatePieceRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let requested = body.company_id.clone().map(CompanyId::new);
    let scope = resolve_company_scope(&auth, requested.as_ref(), false, false)?;
    let Some(company_id) = scope.company_filter().cloned() else {
        return Err(ApiError::bad_request("company_id is required"));
    };
    let piece_type = PieceType::parse(&body.piece_type)
        .ok_or_else(|| ApiError::bad_request("Unsupported piece_type"))?;
    if !matches!(piece_type, PieceType::Postcard | PieceType::Letter) {
        return Err(ApiError::bad_request("piece_type must be postcard or letter"));
    }
    let idempotency = idempotency_from_request(
        body.idempotency_key.as_deref(),
        body.idempotency_in_query.unwrap_or(false),
    );

    let piece = run_blocking(|| -> Result<outreach_gate_core::DirectMailPiece, ApiError> {
        let (entitlement, provider_slug) =
            entitlement_for(&state, &auth, &company_id, Capability::DirectMail)?;
        if provider_slug != "lob" {
            return Err(provider_not_implemented(Capability::DirectMail, &provider_slug));
        }
        let config = org_credentials(&state, &auth, &provider_slug)?;
        let client =
            LobClient::new(&config.api_key).map_err(|err| ApiError::from_provider(&err))?;
        let created = match piece_type {
            PieceType::Postcard => client.create_postcard(&body.payload, &idempotency),
            PieceType::Letter => client.create_letter(&body.payload, &idempotency),
            PieceType::SelfMailer | PieceType::Check => {
                return Err(provider_not_implemented(Capability::DirectMail, &provider_slug));
            }
        }
        .map_err(|err| ApiError::from_provider(&err))?;
        let external_piece_id = response_id(&created)
            .ok_or_else(|| ApiError::bad_request("Provider returned no piece id"))?;
        let piece = state.store.insert_piece(
            &NewPiece {
                org_id: auth.org_id.clone(),
                company_id: company_id.clone(),
                provider_id: entitlement.provider_id.clone(),
                external_piece_id,
                piece_type,
                status: PieceStatus::Queued,
                send_date: created
                    .get("send_date")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                metadata: created.get("metadata").filter(|meta| meta.is_object()).cloned(),
                raw_payload: created,
            },
            &now_rfc3339(),
        )?;
        state.metrics.incr("direct_mail.pieces.created", &[("provider_slug", &provider_slug)]);
        Ok(piece)
    })?;
    log_event(
        state.log.as_ref(),
        "direct_mail_piece_created",
        Some(request_id.as_str()),
        &[
            ("piece_id", json!(piece.id)),
            ("external_piece_id", json!(piece.external_piece_id)),
            ("piece_type", json!(piece.piece_type)),
        ],
    );
    Ok(Json(json!({
        "id": piece.id,
        "external_piece_id": piece.external_piece_id,
        "piece_type": piece.piece_type,
        "status": piece.status,
    }))
    .into_response())
}

/// Body for piece cancellation.
#[derive(Debug, Deserialize, Default)]
pub struct CancelPieceRequest {
    /// Idempotency key forwarded to the producer.
    pub idempotency_key: Option<String>,
    /// Carry the key as a query parameter instead of a header.
    pub idempotency_in_query: Option<bool>,
}

/// Cancels a direct-mail piece with the producer and locally.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern.
pub async fn cancel_direct_mail_piece(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(piece_id): Path<String>,
    Json(body): Json<CancelPieceRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let piece_id = PieceId::new(piece_id);
    let idempotency = idempotency_from_request(
        body.idempotency_key.as_deref(),
        body.idempotency_in_query.unwrap_or(false),
    );
    let status = run_blocking(|| -> Result<PieceStatus, ApiError> {
        let piece = state
            .store
            .piece_by_id(&auth.org_id, &piece_id, auth.company_id.as_ref())?
            .ok_or_else(|| ApiError::not_found("Piece not found"))?;
        let provider = state
            .store
            .provider_by_id(&piece.provider_id)?
            .ok_or_else(|| {
                ApiError::message(StatusCode::INTERNAL_SERVER_ERROR, "Provider not configured")
            })?;
        if provider.slug != "lob" {
            return Err(provider_not_implemented(Capability::DirectMail, &provider.slug));
        }
        let config = org_credentials(&state, &auth, &provider.slug)?;
        let client =
            LobClient::new(&config.api_key).map_err(|err| ApiError::from_provider(&err))?;
        let canceled = match piece.piece_type {
            PieceType::Postcard => client.cancel_postcard(&piece.external_piece_id, &idempotency),
            PieceType::Letter => client.cancel_letter(&piece.external_piece_id, &idempotency),
            PieceType::SelfMailer | PieceType::Check => {
                return Err(provider_not_implemented(Capability::DirectMail, &provider.slug));
            }
        }
        .map_err(|err| ApiError::from_provider(&err))?;
        state.store.update_piece(
            &piece.org_id,
            &piece.id,
            &PieceUpdate {
                status: PieceStatus::Canceled,
                send_date: piece.send_date.clone(),
                metadata: piece.metadata.clone(),
                raw_payload: canceled,
            },
            &now_rfc3339(),
        )?;
        state.metrics.incr("direct_mail.pieces.canceled", &[("provider_slug", "lob")]);
        Ok(PieceStatus::Canceled)
    })?;
    Ok(Json(json!({"id": piece_id, "status": status})).into_response())
}

// ============================================================================
// SECTION: Inbox Writes
// ============================================================================

/// Query parameters for inbox listing.
#[derive(Debug, Deserialize)]
pub struct InboxListQuery {
    /// Target company for org-level callers.
    pub company_id: Option<String>,
    /// Span all companies (org admins only).
    pub all_companies: Option<bool>,
}

/// Lists inboxes within the resolved company scope.
///
/// # Errors
///
/// Returns [`ApiError`] on auth or scope failure.
pub async fn list_inboxes(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<InboxListQuery>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let requested = query.company_id.clone().map(CompanyId::new);
    let scope = resolve_company_scope(
        &auth,
        requested.as_ref(),
        query.all_companies.unwrap_or(false),
        true,
    )?;
    let inboxes =
        run_blocking(|| state.store.list_inboxes(&auth.org_id, scope.company_filter()))?;
    Ok(Json(json!(inboxes)).into_response())
}

/// Body for inbox synchronization.
#[derive(Debug, Deserialize)]
pub struct SyncInboxesRequest {
    /// Target company for org-level callers.
    pub company_id: Option<String>,
}

/// Pulls sender accounts from the entitled provider into the inbox table.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern.
pub async fn sync_inboxes(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<SyncInboxesRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let requested = body.company_id.clone().map(CompanyId::new);
    let scope = resolve_company_scope(&auth, requested.as_ref(), false, false)?;
    let Some(company_id) = scope.company_filter().cloned() else {
        return Err(ApiError::bad_request("company_id is required"));
    };
    let synced = run_blocking(|| -> Result<usize, ApiError> {
        let (entitlement, provider_slug) =
            entitlement_for(&state, &auth, &company_id, Capability::EmailOutreach)?;
        let config = org_credentials(&state, &auth, &provider_slug)?;
        let accounts: Vec<Value> = match provider_slug.as_str() {
            "smartlead" => SmartleadClient::new(&config.api_key)
                .and_then(|client| client.list_email_accounts())
                .map_err(|err| ApiError::from_provider(&err))?,
            "emailbison" => {
                let instance_url = config.instance_url.clone().unwrap_or_default();
                EmailBisonClient::new(&config.api_key, instance_url)
                    .and_then(|client| client.list_sender_emails())
                    .map_err(|err| ApiError::from_provider(&err))?
            }
            other => {
                return Err(provider_not_implemented(Capability::EmailOutreach, other));
            }
        };
        let now = now_rfc3339();
        let mut synced = 0_usize;
        for account in accounts {
            let Some(external_account_id) = response_id(&account) else {
                continue;
            };
            let email = account
                .get("from_email")
                .or_else(|| account.get("email"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let status = account
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("active")
                .to_string();
            let warmup_enabled = account
                .get("warmup_enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            state.store.upsert_inbox(
                &Inbox {
                    id: InboxId::new(Uuid::new_v4().to_string()),
                    org_id: auth.org_id.clone(),
                    company_id: company_id.clone(),
                    provider_id: entitlement.provider_id.clone(),
                    external_account_id,
                    email,
                    status,
                    warmup_enabled,
                    deleted_at: None,
                },
                &now,
            )?;
            synced += 1;
        }
        state.metrics.incr_by(
            "inboxes.synced",
            &[("provider_slug", &provider_slug)],
            i64::try_from(synced).unwrap_or(i64::MAX),
        );
        Ok(synced)
    })?;
    Ok(Json(json!({"synced": synced})).into_response())
}

/// Body for the warmup toggle.
#[derive(Debug, Deserialize)]
pub struct WarmupRequest {
    /// Desired warmup state.
    pub enabled: bool,
}

/// Toggles warmup for one inbox on a warmup-capable provider.
///
/// # Errors
///
/// Returns [`ApiError`] per the write-service pattern; providers without a
/// warmup surface answer 501.
pub async fn set_inbox_warmup(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(inbox_id): Path<String>,
    Json(body): Json<WarmupRequest>,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state.settings.auth, &headers)?;
    let inbox_id = InboxId::new(inbox_id);
    let enabled = run_blocking(|| -> Result<bool, ApiError> {
        let inboxes = state.store.list_inboxes(&auth.org_id, auth.company_id.as_ref())?;
        let inbox = inboxes
            .into_iter()
            .find(|candidate| candidate.id == inbox_id)
            .ok_or_else(|| ApiError::not_found("Inbox not found"))?;
        let provider = state
            .store
            .provider_by_id(&inbox.provider_id)?
            .ok_or_else(|| {
                ApiError::message(StatusCode::INTERNAL_SERVER_ERROR, "Provider not configured")
            })?;
        if provider.slug != "emailbison" {
            return Err(provider_not_implemented(provider.capability, &provider.slug));
        }
        let config = org_credentials(&state, &auth, &provider.slug)?;
        let instance_url = config.instance_url.clone().unwrap_or_default();
        let client = EmailBisonClient::new(&config.api_key, instance_url)
            .map_err(|err| ApiError::from_provider(&err))?;
        client
            .set_warmup(&inbox.external_account_id, body.enabled)
            .map_err(|err| ApiError::from_provider(&err))?;
        state.store.upsert_inbox(
            &Inbox {
                warmup_enabled: body.enabled,
                ..inbox
            },
            &now_rfc3339(),
        )?;
        state.metrics.incr("inboxes.warmup_toggled", &[("provider_slug", "emailbison")]);
        Ok(body.enabled)
    })?;
    Ok(Json(json!({"id": inbox_id, "warmup_enabled": enabled})).into_response())
}

#[cfg(test)]
mod tests;
