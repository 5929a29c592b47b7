// crates/outreach-gate-server/src/projection.rs
// ============================================================================
// Module: Projection Engine
// Description: Applies accepted webhook events onto the domain tables.
// Purpose: Keep local campaign, lead, message, and piece state converged.
// Dependencies: outreach-gate-core, outreach-gate-store-sqlite, serde_json
// ============================================================================

//! ## Overview
//! Projection applies one event to the tenant tables: campaign status,
//! lead status and names, message upserts with inferred direction, and
//! direct-mail piece transitions. Failures are classified by their error
//! text into retryable-transient, terminal, or unknown, and dead-lettered
//! onto the event row. Events are never deleted; a dead letter embeds its
//! reason, retryability, and error inside a `_dead_letter` payload
//! sub-record so the operator surface can filter on it.
//!
//! Within one campaign, projections are last-write-wins by `updated_at`;
//! out-of-order deliveries may regress a status and that is accepted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::PieceType;
use outreach_gate_core::WebhookEvent;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::normalize::normalize_campaign_status;
use outreach_gate_core::normalize::normalize_lead_status;
use outreach_gate_core::normalize::normalize_message_direction;
use outreach_gate_core::normalize::piece_status_for_event;
use outreach_gate_core::payload::extract_campaign_id;
use outreach_gate_core::payload::extract_campaign_status;
use outreach_gate_core::payload::extract_lead_id;
use outreach_gate_core::payload::extract_lead_status;
use outreach_gate_core::payload::extract_lob_resource;
use outreach_gate_core::payload::extract_lob_resource_id;
use outreach_gate_core::payload::extract_lob_resource_type;
use outreach_gate_core::payload::extract_message_id;
use outreach_gate_core::payload::extract_sequence_step_number;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_store_sqlite::EventUpdate;
use outreach_gate_store_sqlite::GatewayStoreError;
use outreach_gate_store_sqlite::MessageUpsert;
use outreach_gate_store_sqlite::NewEvent;
use outreach_gate_store_sqlite::NewPiece;
use outreach_gate_store_sqlite::PieceUpdate;
use serde_json::Value;
use serde_json::json;

use crate::log::log_event;
use crate::server::GatewayState;

// ============================================================================
// SECTION: Projection Errors
// ============================================================================

/// One projection failure with its dead-letter routing decision.
#[derive(Debug, Clone)]
pub struct ProjectionError {
    /// Dead-letter reason label.
    pub reason: &'static str,
    /// Whether a replay is expected to succeed without intervention.
    pub retryable: bool,
    /// Failure detail recorded on the event row.
    pub message: String,
}

impl ProjectionError {
    /// Classifies a generic projection failure by its error text.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            reason: "projection_failure",
            retryable: is_retryable_projection_text(&message),
            message,
        }
    }

    /// A piece event whose tenant scope could not be resolved.
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            reason: "projection_unresolved",
            retryable: false,
            message: "projection_unresolved".to_string(),
        }
    }
}

impl From<GatewayStoreError> for ProjectionError {
    fn from(err: GatewayStoreError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Classifies projection error text into retryable or not.
///
/// Transient markers win over terminal markers; unmatched text is
/// non-retryable by default.
#[must_use]
pub fn is_retryable_projection_text(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("temporar") || lower.contains("connection") {
        return true;
    }
    false
}

// ============================================================================
// SECTION: Sequencer Projection
// ============================================================================

/// Applies a campaign/lead/message event from a sequencer provider.
///
/// Returns whether a local campaign matched the event's scoping hints; an
/// event with no matching campaign is a no-op, not a failure.
///
/// # Errors
///
/// Returns [`ProjectionError`] when a domain write fails.
pub fn apply_sequencer_event(
    state: &GatewayState,
    provider_slug: &str,
    event_type: &str,
    payload: &Value,
) -> Result<bool, ProjectionError> {
    let Some(provider) = state.store.provider_by_slug(provider_slug)? else {
        return Ok(false);
    };
    let Some(campaign_external_id) = extract_campaign_id(payload) else {
        return Ok(false);
    };
    let Some(campaign) =
        state.store.campaign_by_provider_external(&provider.id, &campaign_external_id)?
    else {
        return Ok(false);
    };

    let now = now_rfc3339();
    if let Some(raw_status) = extract_campaign_status(payload) {
        state.store.apply_campaign_status(
            &campaign.org_id,
            &campaign.id,
            normalize_campaign_status(Some(&raw_status)),
            payload,
            &now,
        )?;
    }

    let mut local_lead_id = None;
    if let Some(lead_external_id) = extract_lead_id(payload)
        && let Some(lead) =
            state.store.lead_by_external(&campaign.org_id, &campaign.id, &lead_external_id)?
    {
        if let Some(raw_status) = extract_lead_status(payload) {
            state.store.apply_lead_status(
                &campaign.org_id,
                &lead.id,
                normalize_lead_status(Some(&raw_status)),
                payload,
                &now,
            )?;
        }
        local_lead_id = Some(lead.id);
    }

    if let Some(external_message_id) = extract_message_id(payload) {
        let direction = infer_direction(event_type);
        let body = payload
            .get("email_body")
            .or_else(|| payload.get("body"))
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let sent_at = payload
            .get("sent_at")
            .or_else(|| payload.get("created_at"))
            .and_then(Value::as_str)
            .map(str::to_string);
        state.store.upsert_message(
            &MessageUpsert {
                org_id: campaign.org_id.clone(),
                company_id: campaign.company_id.clone(),
                company_campaign_id: campaign.id.clone(),
                company_campaign_lead_id: local_lead_id,
                provider_id: campaign.provider_id.clone(),
                external_message_id,
                direction,
                sequence_step_number: extract_sequence_step_number(payload),
                subject: payload.get("subject").and_then(Value::as_str).map(str::to_string),
                body,
                sent_at,
                raw_payload: payload.clone(),
            },
            &now,
        )?;
    }
    Ok(true)
}

/// Infers message direction from the event type name.
fn infer_direction(event_type: &str) -> outreach_gate_core::normalize::MessageDirection {
    let lower = event_type.to_ascii_lowercase();
    let hint = if lower.contains("reply") || lower.contains("replied") {
        "inbound"
    } else if lower.contains("message") || lower.contains("sent") {
        "outbound"
    } else {
        "unknown"
    };
    normalize_message_direction(Some(hint))
}

// ============================================================================
// SECTION: Direct-Mail Projection
// ============================================================================

/// Applies a direct-mail piece event.
///
/// An existing piece is updated in place. A new piece can only be created
/// when the payload carries enough material to place it inside a tenant
/// (piece type plus `org_id`/`company_id`); otherwise the projection is
/// refused as unresolved.
///
/// # Errors
///
/// Returns [`ProjectionError::unresolved`] when tenant scope is unknown and
/// a classified failure when a domain write fails.
pub fn apply_lob_event(
    state: &GatewayState,
    piece_external_id: &str,
    normalized_event_type: &str,
    payload: &Value,
) -> Result<(), ProjectionError> {
    let Some(provider) = state.store.provider_by_slug("lob")? else {
        return Err(ProjectionError::unresolved());
    };
    let status = piece_status_for_event(normalized_event_type);
    let resource = extract_lob_resource(payload);
    let send_date = resource
        .and_then(|res| res.get("send_date"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let metadata = resource
        .and_then(|res| res.get("metadata"))
        .filter(|meta| meta.is_object())
        .cloned();
    let now = now_rfc3339();

    if let Some(piece) = state.store.piece_by_external(&provider.id, piece_external_id)? {
        state.store.update_piece(
            &piece.org_id,
            &piece.id,
            &PieceUpdate {
                status,
                send_date,
                metadata,
                raw_payload: payload.clone(),
            },
            &now,
        )?;
        return Ok(());
    }

    let piece_type = extract_lob_resource_type(payload)
        .as_deref()
        .and_then(PieceType::from_resource_type);
    let org_id = payload.get("org_id").and_then(Value::as_str).map(OrgId::new);
    let company_id = payload.get("company_id").and_then(Value::as_str).map(CompanyId::new);
    let (Some(piece_type), Some(org_id), Some(company_id)) = (piece_type, org_id, company_id)
    else {
        return Err(ProjectionError::unresolved());
    };
    state.store.insert_piece(
        &NewPiece {
            org_id,
            company_id,
            provider_id: provider.id,
            external_piece_id: piece_external_id.to_string(),
            piece_type,
            status,
            send_date,
            metadata,
            raw_payload: payload.clone(),
        },
        &now,
    )?;
    Ok(())
}

// ============================================================================
// SECTION: Replay Dispatch
// ============================================================================

/// Re-applies a stored event's projection, dispatched by provider family.
///
/// # Errors
///
/// Returns [`ProjectionError`] when the projection fails.
pub fn project_stored_event(
    state: &GatewayState,
    provider_slug: &str,
    event: &WebhookEvent,
) -> Result<(), ProjectionError> {
    if provider_slug == "lob" {
        if let Some(piece_external_id) = extract_lob_resource_id(&event.payload) {
            apply_lob_event(state, &piece_external_id, &event.event_type, &event.payload)?;
        }
        state.metrics.incr(
            "webhook.projection.success",
            &[("provider_slug", "lob"), ("event_type", &event.event_type)],
        );
        return Ok(());
    }
    apply_sequencer_event(state, provider_slug, &event.event_type, &event.payload)?;
    Ok(())
}

// ============================================================================
// SECTION: Dead-Letter Recording
// ============================================================================

/// Records a dead letter on the event row, creating the row when absent.
///
/// The event row is never deleted: its payload gains a `_dead_letter`
/// sub-record and the status flips to `dead_letter`.
#[allow(clippy::too_many_arguments, reason = "Mirrors the dead-letter record shape.")]
pub fn record_dead_letter(
    state: &GatewayState,
    provider_slug: &str,
    event_key: &str,
    event_type: &str,
    payload: &Value,
    org_id: Option<&OrgId>,
    company_id: Option<&CompanyId>,
    error: &ProjectionError,
    request_id: Option<&str>,
) {
    let now = now_rfc3339();
    let mut enriched = payload.clone();
    if let Some(map) = enriched.as_object_mut() {
        map.insert(
            "_dead_letter".to_string(),
            json!({
                "reason": error.reason,
                "retryable": error.retryable,
                "error": error.message,
                "recorded_at": now,
            }),
        );
    }
    let update = EventUpdate {
        status: Some(WebhookEventStatus::DeadLetter),
        payload: Some(enriched.clone()),
        last_error: Some(Some(error.message.clone())),
        org_id: org_id.cloned(),
        company_id: company_id.cloned(),
        processed_at: Some(now.clone()),
        ..EventUpdate::default()
    };
    let updated = state.store.update_event_by_key(provider_slug, event_key, &update);
    let persisted = match updated {
        Ok(Some(_)) => true,
        Ok(None) => {
            let inserted = state.store.insert_event(&NewEvent {
                provider_slug: provider_slug.to_string(),
                event_key: event_key.to_string(),
                event_type: event_type.to_string(),
                status: WebhookEventStatus::DeadLetter,
                payload: enriched,
                org_id: org_id.cloned(),
                company_id: company_id.cloned(),
                created_at: now.clone(),
                processed_at: Some(now.clone()),
            });
            match inserted {
                Ok(_) => {
                    let _ = state.store.update_event_by_key(
                        provider_slug,
                        event_key,
                        &EventUpdate {
                            last_error: Some(Some(error.message.clone())),
                            ..EventUpdate::default()
                        },
                    );
                    true
                }
                Err(err) => {
                    log_event(
                        state.log.as_ref(),
                        "webhook_dead_letter_persist_failed",
                        request_id,
                        &[
                            ("provider_slug", json!(provider_slug)),
                            ("event_key", json!(event_key)),
                            ("error", json!(err.to_string())),
                        ],
                    );
                    false
                }
            }
        }
        Err(err) => {
            log_event(
                state.log.as_ref(),
                "webhook_dead_letter_persist_failed",
                request_id,
                &[
                    ("provider_slug", json!(provider_slug)),
                    ("event_key", json!(event_key)),
                    ("error", json!(err.to_string())),
                ],
            );
            false
        }
    };
    if !persisted {
        return;
    }
    let retryable_label = if error.retryable { "true" } else { "false" };
    state.metrics.incr(
        "webhook.dead_letter.recorded",
        &[
            ("provider_slug", provider_slug),
            ("reason", error.reason),
            ("retryable", retryable_label),
        ],
    );
    state.metrics.incr(
        "webhook.dead_letter.created",
        &[
            ("provider_slug", provider_slug),
            ("reason", error.reason),
            ("retryable", retryable_label),
        ],
    );
    log_event(
        state.log.as_ref(),
        "webhook_dead_letter_recorded",
        request_id,
        &[
            ("provider_slug", json!(provider_slug)),
            ("event_key", json!(event_key)),
            ("event_type", json!(event_type)),
            ("reason", json!(error.reason)),
            ("retryable", json!(error.retryable)),
        ],
    );
}
