// crates/outreach-gate-server/src/webhooks.rs
// ============================================================================
// Module: Webhook Gateway
// Description: Per-provider ingestion endpoints with trust and idempotency.
// Purpose: Admit hostile deliveries into the event store exactly once.
// Dependencies: axum, outreach-gate-core, outreach-gate-store-sqlite
// ============================================================================

//! ## Overview
//! One ingestion endpoint per provider. Signed sequencers verify an HMAC
//! and project synchronously; the unsigned-origin provider is admitted by
//! path token plus origin allowlist and projects on a background task; the
//! direct-mail producer verifies a replay-window signature, validates the
//! payload schema, and dead-letters instead of erroring so the producer
//! stops retrying. Duplicates short-circuit on the event-store uniqueness
//! constraint and always answer 200.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::Extension;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::compute_event_key;
use outreach_gate_core::compute_lob_event_key;
use outreach_gate_core::extract_campaign_id;
use outreach_gate_core::extract_event_type;
use outreach_gate_core::extract_lob_payload_version;
use outreach_gate_core::extract_lob_resource_id;
use outreach_gate_core::normalize::normalize_lob_event_type;
use outreach_gate_core::payload::SchemaValidationError;
use outreach_gate_core::payload::validate_lob_payload_schema;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_store_sqlite::GatewayStoreError;
use outreach_gate_store_sqlite::NewEvent;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::api::ApiError;
use crate::log::log_event;
use crate::projection::ProjectionError;
use crate::projection::apply_lob_event;
use crate::projection::apply_sequencer_event;
use crate::projection::record_dead_letter;
use crate::server::GatewayState;
use crate::server::RequestId;
use crate::server::persist_gateway_snapshot;
use crate::server::run_blocking;
use crate::trust::verify_emailbison_contract;
use crate::trust::verify_hmac_or_reject;
use crate::trust::verify_lob_signature;

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Renders request headers into a JSON object for ingestion metadata.
fn headers_as_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            Value::String(value.to_str().unwrap_or_default().to_string()),
        );
    }
    Value::Object(map)
}

/// Resolves the tenant scope hinted by a campaign-bearing payload.
fn resolve_campaign_scope(
    state: &GatewayState,
    provider_slug: &str,
    payload: &Value,
) -> Result<(Option<OrgId>, Option<CompanyId>, bool), GatewayStoreError> {
    let Some(campaign_external_id) = extract_campaign_id(payload) else {
        return Ok((None, None, false));
    };
    let Some(provider) = state.store.provider_by_slug(provider_slug)? else {
        return Ok((None, None, false));
    };
    let Some(campaign) =
        state.store.campaign_by_provider_external(&provider.id, &campaign_external_id)?
    else {
        return Ok((None, None, false));
    };
    Ok((Some(campaign.org_id), Some(campaign.company_id), true))
}

/// Builds the 200 duplicate response for the signed sequencer providers.
fn duplicate_response() -> Response {
    (StatusCode::OK, Json(json!({"detail": "Duplicate event ignored"}))).into_response()
}

// ============================================================================
// SECTION: Signed Sequencer Ingest
// ============================================================================

/// Ingests a Smartlead webhook delivery.
///
/// # Errors
///
/// Returns [`ApiError`] on trust or parse failure.
pub async fn ingest_smartlead(
    State(state): State<Arc<GatewayState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let secret = state.settings.smartlead_webhook_secret.clone();
    ingest_signed_sequencer(
        &state,
        "smartlead",
        "x-smartlead-signature",
        secret.as_deref(),
        &headers,
        &body,
        request_id.as_str(),
    )
}

/// Ingests a HeyReach webhook delivery.
///
/// # Errors
///
/// Returns [`ApiError`] on trust or parse failure.
pub async fn ingest_heyreach(
    State(state): State<Arc<GatewayState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let secret = state.settings.heyreach_webhook_secret.clone();
    ingest_signed_sequencer(
        &state,
        "heyreach",
        "x-heyreach-signature",
        secret.as_deref(),
        &headers,
        &body,
        request_id.as_str(),
    )
}

/// Shared ingest flow for the HMAC-signed sequencer providers.
fn ingest_signed_sequencer(
    state: &GatewayState,
    provider_slug: &str,
    signature_header: &str,
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &Bytes,
    request_id: &str,
) -> Result<Response, ApiError> {
    state.metrics.incr("webhook.events.received", &[("provider_slug", provider_slug)]);
    let signature = headers.get(signature_header).and_then(|value| value.to_str().ok());
    verify_hmac_or_reject(body, signature, secret)?;

    let payload: Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::bad_request("Invalid JSON payload"))?;
    let event_type = extract_event_type(&payload);
    let event_key = compute_event_key(&payload, body);
    log_event(
        state.log.as_ref(),
        "webhook_received",
        Some(request_id),
        &[
            ("provider_slug", json!(provider_slug)),
            ("event_type", json!(event_type)),
            ("event_key", json!(event_key)),
            ("has_campaign_id", json!(extract_campaign_id(&payload).is_some())),
        ],
    );

    let outcome = run_blocking(|| {
        let (org_id, company_id, campaign_found) =
            resolve_campaign_scope(state, provider_slug, &payload)?;
        let now = now_rfc3339();
        let inserted = state.store.insert_event(&NewEvent {
            provider_slug: provider_slug.to_string(),
            event_key: event_key.clone(),
            event_type: event_type.clone(),
            status: WebhookEventStatus::Processed,
            payload: payload.clone(),
            org_id: org_id.clone(),
            company_id: company_id.clone(),
            created_at: now.clone(),
            processed_at: Some(now),
        });
        match inserted {
            Ok(_) => {}
            Err(GatewayStoreError::DuplicateEvent { .. }) => {
                return Ok::<_, GatewayStoreError>(SequencerOutcome::Duplicate);
            }
            Err(err) => return Err(err),
        }
        match apply_sequencer_event(state, provider_slug, &event_type, &payload) {
            Ok(_) => Ok(SequencerOutcome::Processed {
                campaign_found,
            }),
            Err(projection_error) => {
                record_dead_letter(
                    state,
                    provider_slug,
                    &event_key,
                    &event_type,
                    &payload,
                    org_id.as_ref(),
                    company_id.as_ref(),
                    &projection_error,
                    Some(request_id),
                );
                Ok(SequencerOutcome::DeadLetter(projection_error))
            }
        }
    });

    match outcome {
        Ok(SequencerOutcome::Duplicate) => {
            state.metrics.incr("webhook.events.duplicate", &[("provider_slug", provider_slug)]);
            log_event(
                state.log.as_ref(),
                "webhook_duplicate_ignored",
                Some(request_id),
                &[
                    ("provider_slug", json!(provider_slug)),
                    ("event_type", json!(event_type)),
                    ("event_key", json!(event_key)),
                ],
            );
            Ok(duplicate_response())
        }
        Ok(SequencerOutcome::Processed {
            campaign_found,
        }) => {
            state.metrics.incr("webhook.events.processed", &[("provider_slug", provider_slug)]);
            log_event(
                state.log.as_ref(),
                "webhook_processed",
                Some(request_id),
                &[
                    ("provider_slug", json!(provider_slug)),
                    ("event_type", json!(event_type)),
                    ("event_key", json!(event_key)),
                    ("campaign_found", json!(campaign_found)),
                ],
            );
            Ok(Json(json!({
                "status": "processed",
                "event_type": event_type,
                "event_key": event_key,
            }))
            .into_response())
        }
        Ok(SequencerOutcome::DeadLetter(projection_error)) => {
            state.metrics.incr("webhook.events.failed", &[("provider_slug", provider_slug)]);
            log_event(
                state.log.as_ref(),
                "webhook_failed",
                Some(request_id),
                &[
                    ("provider_slug", json!(provider_slug)),
                    ("event_type", json!(event_type)),
                    ("event_key", json!(event_key)),
                    ("error", json!(projection_error.message)),
                ],
            );
            Ok(Json(json!({
                "status": "dead_letter_recorded",
                "event_type": event_type,
                "event_key": event_key,
                "dead_letter": {
                    "reason": projection_error.reason,
                    "retryable": projection_error.retryable,
                },
            }))
            .into_response())
        }
        Err(err) => {
            state.metrics.incr("webhook.events.failed", &[("provider_slug", provider_slug)]);
            Err(ApiError::from_store(&err))
        }
    }
}

/// Result of the signed sequencer ingest flow.
enum SequencerOutcome {
    /// The delivery was a duplicate of a stored event.
    Duplicate,
    /// Projection succeeded.
    Processed {
        /// Whether a local campaign matched the payload hints.
        campaign_found: bool,
    },
    /// Projection failed and was dead-lettered.
    DeadLetter(ProjectionError),
}

// ============================================================================
// SECTION: Unsigned-Origin Ingest
// ============================================================================

/// Rejects tokenless posts to the unsigned-origin route.
///
/// # Errors
///
/// Always returns the structured 401.
pub async fn ingest_emailbison_without_token() -> Result<Response, ApiError> {
    Err(ApiError::new(
        StatusCode::UNAUTHORIZED,
        json!({
            "type": "webhook_auth_failed",
            "provider": "emailbison",
            "reason": "missing_path_token",
            "message": "EmailBison webhook requires a secret path token",
        }),
    ))
}

/// Ingests an EmailBison delivery admitted by path token plus origin.
///
/// The event is stored as `accepted` and projected on a background task.
///
/// # Errors
///
/// Returns [`ApiError`] on trust failure.
pub async fn ingest_emailbison(
    State(state): State<Arc<GatewayState>>,
    Path(path_token): Path<String>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.metrics.incr("webhook.events.received", &[("provider_slug", "emailbison")]);
    let origin_host = verify_emailbison_contract(&state.settings, &headers, &path_token)?;

    let raw_text = String::from_utf8_lossy(&body).to_string();
    let mut malformed_json = false;
    let parsed: Value = serde_json::from_slice(&body).unwrap_or_else(|_| {
        malformed_json = true;
        json!({"raw_body": raw_text.clone()})
    });
    let payload = if parsed.is_object() { parsed } else { json!({"raw_payload": parsed}) };
    let event_type = extract_event_type(&payload);
    let event_key = compute_event_key(&payload, &body);

    let mut enriched = payload.clone();
    if let Some(map) = enriched.as_object_mut() {
        map.insert(
            "_ingestion".to_string(),
            json!({
                "provider_slug": "emailbison",
                "trust_mode": "unsigned_origin_plus_path_token",
                "origin_host": origin_host,
                "received_at": now_rfc3339(),
                "request_headers": headers_as_json(&headers),
                "raw_body": raw_text,
                "request_id": request_id.as_str(),
            }),
        );
        if malformed_json {
            map.insert("malformed_json".to_string(), Value::Bool(true));
        }
    }

    log_event(
        state.log.as_ref(),
        "webhook_received",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!("emailbison")),
            ("event_type", json!(event_type)),
            ("event_key", json!(event_key)),
            ("trust_mode", json!("unsigned_origin_plus_path_token")),
            ("origin_host", json!(origin_host)),
            ("has_campaign_id", json!(extract_campaign_id(&payload).is_some())),
        ],
    );

    let insert_result = run_blocking(|| {
        let (org_id, company_id, _) = resolve_campaign_scope(&state, "emailbison", &payload)?;
        state.store.insert_event(&NewEvent {
            provider_slug: "emailbison".to_string(),
            event_key: event_key.clone(),
            event_type: event_type.clone(),
            status: WebhookEventStatus::Accepted,
            payload: enriched.clone(),
            org_id,
            company_id,
            created_at: now_rfc3339(),
            processed_at: None,
        })
    });
    match insert_result {
        Ok(_) => {}
        Err(GatewayStoreError::DuplicateEvent { .. }) => {
            state.metrics.incr("webhook.events.duplicate", &[("provider_slug", "emailbison")]);
            state.metrics.incr("webhook.duplicate_ignored", &[("provider_slug", "emailbison")]);
            return Ok(Json(json!({
                "status": "duplicate_ignored",
                "event_type": event_type,
                "event_key": event_key,
            }))
            .into_response());
        }
        Err(err) => return Err(ApiError::from_store(&err)),
    }

    state.metrics.incr("webhook.events.accepted", &[("provider_slug", "emailbison")]);
    let task_state = Arc::clone(&state);
    let task_event_key = event_key.clone();
    let task_event_type = event_type.clone();
    let task_request_id = request_id.as_str().to_string();
    tokio::task::spawn_blocking(move || {
        process_emailbison_event(
            &task_state,
            &task_event_key,
            &task_event_type,
            &enriched,
            &task_request_id,
        );
    });

    Ok(Json(json!({
        "status": "accepted",
        "event_type": event_type,
        "event_key": event_key,
        "trust_mode": "unsigned_origin_plus_path_token",
        "non_cryptographic_trust": true,
    }))
    .into_response())
}

/// Projects one accepted EmailBison event on the background scheduler.
fn process_emailbison_event(
    state: &GatewayState,
    event_key: &str,
    event_type: &str,
    payload: &Value,
    request_id: &str,
) {
    let scope = resolve_campaign_scope(state, "emailbison", payload);
    let (org_id, company_id, campaign_found) = match scope {
        Ok(resolved) => resolved,
        Err(err) => {
            let projection_error = ProjectionError::failure(err.to_string());
            record_dead_letter(
                state,
                "emailbison",
                event_key,
                event_type,
                payload,
                None,
                None,
                &projection_error,
                Some(request_id),
            );
            return;
        }
    };
    match apply_sequencer_event(state, "emailbison", event_type, payload) {
        Ok(_) => {
            let update = outreach_gate_store_sqlite::EventUpdate {
                status: Some(WebhookEventStatus::Processed),
                processed_at: Some(now_rfc3339()),
                last_error: Some(None),
                org_id: org_id.clone(),
                company_id: company_id.clone(),
                ..outreach_gate_store_sqlite::EventUpdate::default()
            };
            let _ = state.store.update_event_by_key("emailbison", event_key, &update);
            state.metrics.incr("webhook.events.processed", &[("provider_slug", "emailbison")]);
            log_event(
                state.log.as_ref(),
                "webhook_processed_async",
                Some(request_id),
                &[
                    ("provider_slug", json!("emailbison")),
                    ("event_type", json!(event_type)),
                    ("event_key", json!(event_key)),
                    ("campaign_found", json!(campaign_found)),
                ],
            );
        }
        Err(projection_error) => {
            state.metrics.incr("webhook.events.failed", &[("provider_slug", "emailbison")]);
            record_dead_letter(
                state,
                "emailbison",
                event_key,
                event_type,
                payload,
                org_id.as_ref(),
                company_id.as_ref(),
                &projection_error,
                Some(request_id),
            );
            log_event(
                state.log.as_ref(),
                "webhook_async_processing_failed",
                Some(request_id),
                &[
                    ("provider_slug", json!("emailbison")),
                    ("event_type", json!(event_type)),
                    ("event_key", json!(event_key)),
                    ("error", json!(projection_error.message)),
                ],
            );
        }
    }
}

// ============================================================================
// SECTION: Direct-Mail Ingest
// ============================================================================

/// Ingests a direct-mail delivery under the replay-window trust model.
///
/// Projection failures dead-letter and still answer 200 so the producer
/// stops retrying.
///
/// # Errors
///
/// Returns [`ApiError`] on signature rejection or configuration error.
pub async fn ingest_lob(
    State(state): State<Arc<GatewayState>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let signature = match verify_lob_signature(
        &state.settings,
        &state.metrics,
        state.log.as_ref(),
        &headers,
        &body,
        Some(request_id.as_str()),
    ) {
        Ok(result) => result,
        Err(err) => {
            run_blocking(|| {
                persist_gateway_snapshot(
                    &state,
                    "lob_webhook_signature_reject",
                    Some(request_id.as_str()),
                );
            });
            return Err(err);
        }
    };
    let signature_mode = signature.mode.as_str();
    state.metrics.incr("webhook.events.received", &[("provider_slug", "lob")]);
    state.metrics.incr(
        "webhook.events.accepted",
        &[("provider_slug", "lob"), ("signature_mode", signature_mode)],
    );

    let raw_text = String::from_utf8_lossy(&body).to_string();
    let mut malformed_json = false;
    let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|_| {
        malformed_json = true;
        json!({"raw_body": raw_text, "malformed_json": true})
    });

    let validation = if malformed_json {
        None
    } else {
        Some(validate_lob_payload_schema(&payload, &state.settings.lob_schema_versions))
    };
    let payload_version = extract_lob_payload_version(&payload);
    let raw_event_type = extract_event_type(&payload);
    let normalized_event_type = normalize_lob_event_type(Some(&raw_event_type));
    let event_key = compute_lob_event_key(&payload, &body);
    let piece_external_id = extract_lob_resource_id(&payload);

    let (org_id, company_id) = run_blocking(|| {
        let resolved = piece_external_id.as_deref().and_then(|external_id| {
            let provider = state.store.provider_by_slug("lob").ok().flatten()?;
            state.store.piece_by_external(&provider.id, external_id).ok().flatten()
        });
        resolved.map_or((None, None), |piece| (Some(piece.org_id), Some(piece.company_id)))
    });

    let mut enriched = payload.clone();
    if let Some(map) = enriched.as_object_mut() {
        map.insert(
            "_ingestion".to_string(),
            json!({
                "provider_slug": "lob",
                "payload_version": payload_version,
                "signature_mode": signature_mode,
                "signature_verified": signature.verified,
                "signature_reason": signature.reason,
                "signature_timestamp": signature.timestamp,
                "request_headers": headers_as_json(&headers),
                "request_id": request_id.as_str(),
            }),
        );
        let schema_validation = match &validation {
            Some(Ok(version)) => json!({"status": "ok", "version": version}),
            Some(Err(err)) => json!({
                "status": "failed",
                "reason": err.reason(),
                "detail": err.detail(),
            }),
            None => json!({"status": "failed", "reason": "malformed_payload", "detail": ""}),
        };
        map.insert("_schema_validation".to_string(), schema_validation);
        if let Some(external_id) = &piece_external_id {
            map.insert("resource_id".to_string(), Value::String(external_id.clone()));
        }
    }

    log_event(
        state.log.as_ref(),
        "webhook_received",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!("lob")),
            ("event_type", json!(normalized_event_type)),
            ("event_key", json!(event_key)),
            ("signature_mode", json!(signature_mode)),
            ("signature_verified", json!(signature.verified)),
            ("signature_reason", json!(signature.reason)),
            ("has_piece_id", json!(piece_external_id.is_some())),
        ],
    );

    // Failures from here on dead-letter rather than erroring back to the
    // producer.
    let failure: Option<ProjectionError> = if malformed_json {
        Some(ProjectionError {
            reason: "malformed_payload",
            retryable: false,
            message: "malformed_json_payload".to_string(),
        })
    } else {
        match &validation {
            Some(Err(SchemaValidationError::SchemaInvalid(detail))) => Some(ProjectionError {
                reason: "schema_invalid",
                retryable: false,
                message: format!("schema_invalid:{detail}"),
            }),
            Some(Err(SchemaValidationError::VersionUnsupported(version))) => {
                Some(ProjectionError {
                    reason: "version_unsupported",
                    retryable: false,
                    message: format!("version_unsupported:{version}"),
                })
            }
            _ => None,
        }
    };

    if let Some(projection_error) = failure {
        return Ok(lob_dead_letter_response(
            &state,
            &event_key,
            &normalized_event_type,
            &enriched,
            org_id.as_ref(),
            company_id.as_ref(),
            &signature,
            projection_error,
            request_id.as_str(),
        ));
    }

    let insert_result = run_blocking(|| {
        state.store.insert_event(&NewEvent {
            provider_slug: "lob".to_string(),
            event_key: event_key.clone(),
            event_type: normalized_event_type.clone(),
            status: WebhookEventStatus::Processed,
            payload: enriched.clone(),
            org_id: org_id.clone(),
            company_id: company_id.clone(),
            created_at: now_rfc3339(),
            processed_at: Some(now_rfc3339()),
        })
    });
    match insert_result {
        Ok(_) => {}
        Err(GatewayStoreError::DuplicateEvent { .. }) => {
            state.metrics.incr("webhook.events.duplicate", &[("provider_slug", "lob")]);
            state.metrics.incr("webhook.duplicate_ignored", &[("provider_slug", "lob")]);
            log_event(
                state.log.as_ref(),
                "webhook_duplicate_ignored",
                Some(request_id.as_str()),
                &[
                    ("provider_slug", json!("lob")),
                    ("event_type", json!(normalized_event_type)),
                    ("event_key", json!(event_key)),
                ],
            );
            run_blocking(|| {
                persist_gateway_snapshot(&state, "lob_webhook_ingest", Some(request_id.as_str()));
            });
            return Ok(Json(json!({
                "status": "duplicate_ignored",
                "event_type": normalized_event_type,
                "event_key": event_key,
                "signature_mode": signature_mode,
                "signature_verified": signature.verified,
                "signature_reason": signature.reason,
            }))
            .into_response());
        }
        Err(err) => return Err(ApiError::from_store(&err)),
    }

    let projection = run_blocking(|| {
        piece_external_id.as_deref().map_or(Ok(()), |external_id| {
            apply_lob_event(&state, external_id, &normalized_event_type, &enriched)
        })
    });
    if let Err(projection_error) = projection {
        return Ok(lob_dead_letter_response(
            &state,
            &event_key,
            &normalized_event_type,
            &enriched,
            org_id.as_ref(),
            company_id.as_ref(),
            &signature,
            projection_error,
            request_id.as_str(),
        ));
    }

    state.metrics.incr(
        "webhook.projection.success",
        &[("provider_slug", "lob"), ("event_type", &normalized_event_type)],
    );
    state.metrics.incr("webhook.events.processed", &[("provider_slug", "lob")]);
    log_event(
        state.log.as_ref(),
        "webhook_processed",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!("lob")),
            ("event_type", json!(normalized_event_type)),
            ("event_key", json!(event_key)),
            ("signature_mode", json!(signature_mode)),
            ("signature_verified", json!(signature.verified)),
            ("signature_reason", json!(signature.reason)),
        ],
    );
    run_blocking(|| {
        persist_gateway_snapshot(&state, "lob_webhook_ingest", Some(request_id.as_str()));
    });
    Ok(Json(json!({
        "status": "processed",
        "event_type": normalized_event_type,
        "event_key": event_key,
        "signature_mode": signature_mode,
        "signature_verified": signature.verified,
        "signature_reason": signature.reason,
    }))
    .into_response())
}

/// Records a direct-mail dead letter and builds the 200 response.
#[allow(clippy::too_many_arguments, reason = "Mirrors the dead-letter record shape.")]
fn lob_dead_letter_response(
    state: &GatewayState,
    event_key: &str,
    normalized_event_type: &str,
    payload: &Value,
    org_id: Option<&OrgId>,
    company_id: Option<&CompanyId>,
    signature: &crate::trust::LobSignatureResult,
    projection_error: ProjectionError,
    request_id: &str,
) -> Response {
    state.metrics.incr("webhook.events.failed", &[("provider_slug", "lob")]);
    state.metrics.incr(
        "webhook.projection.failure",
        &[("provider_slug", "lob"), ("event_type", normalized_event_type)],
    );
    log_event(
        state.log.as_ref(),
        "webhook_failed",
        Some(request_id),
        &[
            ("provider_slug", json!("lob")),
            ("event_type", json!(normalized_event_type)),
            ("event_key", json!(event_key)),
            ("error", json!(projection_error.message)),
        ],
    );
    run_blocking(|| {
        record_dead_letter(
            state,
            "lob",
            event_key,
            normalized_event_type,
            payload,
            org_id,
            company_id,
            &projection_error,
            Some(request_id),
        );
        persist_gateway_snapshot(state, "lob_webhook_ingest", Some(request_id));
    });
    Json(json!({
        "status": "dead_letter_recorded",
        "event_type": normalized_event_type,
        "event_key": event_key,
        "signature_mode": signature.mode.as_str(),
        "signature_verified": signature.verified,
        "signature_reason": signature.reason,
        "dead_letter": {
            "reason": projection_error.reason,
            "retryable": projection_error.retryable,
        },
    }))
    .into_response()
}

#[cfg(test)]
mod tests;
