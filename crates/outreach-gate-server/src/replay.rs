// crates/outreach-gate-server/src/replay.rs
// ============================================================================
// Module: Dead-Letter & Replay Controller
// Description: Operator surface for event inspection and bounded replay.
// Purpose: Recover dead-lettered events without overwhelming projection.
// Dependencies: axum, outreach-gate-core, outreach-gate-store-sqlite
// ============================================================================

//! ## Overview
//! All routes here are super-admin scoped. Single replay re-applies one
//! event's projection and flips it to `replayed` on success. Bulk replay is
//! the delicate part: work runs in batches through a bounded worker pool
//! whose in-flight cap is `queue_size`, with an adaptive inter-batch sleep
//! that multiplies on failed batches and decays on clean ones. Duplicate
//! keys inside one request replay once; the extras are answered with
//! `duplicate_request_key_ignored`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use axum::Json;
use axum::extract::Extension;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use outreach_gate_config::ReplayControls;
use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::WebhookEvent;
use outreach_gate_core::WebhookEventStatus;
use outreach_gate_core::time::now_rfc3339;
use outreach_gate_core::time::parse_rfc3339;
use outreach_gate_providers::is_supported_provider;
use outreach_gate_store_sqlite::EventFilter;
use outreach_gate_store_sqlite::EventUpdate;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::api::ApiError;
use crate::auth::authenticate_super_admin;
use crate::log::log_event;
use crate::projection::project_stored_event;
use crate::server::GatewayState;
use crate::server::RequestId;
use crate::server::persist_gateway_snapshot;
use crate::server::run_blocking;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum dead-letter listing window in days.
const MAX_WINDOW_DAYS: i64 = 93;

// ============================================================================
// SECTION: Single Replay Core
// ============================================================================

/// A failed replay with its external detail.
#[derive(Debug, Clone)]
pub struct ReplayFailure {
    /// Structured `webhook_replay_failed` detail.
    pub detail: Value,
    /// Whether the underlying projection failure was transient.
    pub retryable: bool,
}

/// Re-applies one stored event's projection.
///
/// Success flips the event to `replayed`, increments `replay_count` by
/// exactly one, stamps `last_replay_at`, and clears `last_error`. Failure
/// re-marks the event as dead-lettered with the fresh error.
///
/// # Errors
///
/// Returns [`ReplayFailure`] when the projection fails.
pub fn replay_event(
    state: &GatewayState,
    provider_slug: &str,
    event: &WebhookEvent,
    request_id: &str,
) -> Result<String, ReplayFailure> {
    if let Err(projection_error) = project_stored_event(state, provider_slug, event) {
        let now = now_rfc3339();
        let _ = state.store.update_event_by_key(
            provider_slug,
            &event.event_key,
            &EventUpdate {
                status: Some(WebhookEventStatus::DeadLetter),
                last_error: Some(Some(projection_error.message.clone())),
                processed_at: Some(now),
                ..EventUpdate::default()
            },
        );
        state.metrics.incr("webhook.replays.failed", &[("provider_slug", provider_slug)]);
        if provider_slug == "lob" {
            state.metrics.incr(
                "webhook.projection.failure",
                &[("provider_slug", "lob"), ("event_type", &event.event_type)],
            );
        }
        log_event(
            state.log.as_ref(),
            "webhook_replay_failed",
            Some(request_id),
            &[
                ("provider_slug", json!(provider_slug)),
                ("event_key", json!(event.event_key)),
                ("event_type", json!(event.event_type)),
                ("error", json!(projection_error.message)),
            ],
        );
        return Err(ReplayFailure {
            detail: json!({
                "type": "webhook_replay_failed",
                "provider_slug": provider_slug,
                "event_key": event.event_key,
                "reason": projection_error.message,
                "retryable": projection_error.retryable,
            }),
            retryable: projection_error.retryable,
        });
    }
    let now = now_rfc3339();
    let _ = state.store.update_event_by_key(
        provider_slug,
        &event.event_key,
        &EventUpdate {
            status: Some(WebhookEventStatus::Replayed),
            replay_count: Some(event.replay_count + 1),
            last_replay_at: Some(now.clone()),
            last_error: Some(None),
            processed_at: Some(now),
            ..EventUpdate::default()
        },
    );
    state.metrics.incr("webhook.replays.processed", &[("provider_slug", provider_slug)]);
    state.metrics.incr("webhook.replay_processed", &[("provider_slug", provider_slug)]);
    log_event(
        state.log.as_ref(),
        "webhook_replay_processed",
        Some(request_id),
        &[
            ("provider_slug", json!(provider_slug)),
            ("event_key", json!(event.event_key)),
            ("event_type", json!(event.event_type)),
        ],
    );
    Ok(event.event_type.clone())
}

// ============================================================================
// SECTION: Bulk Machinery
// ============================================================================

/// One bulk replay result item.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayBulkItem {
    /// Event key the item refers to.
    pub event_key: String,
    /// Outcome label (`replayed`, `not_found`, `replay_failed`).
    pub status: String,
    /// Event type when the row was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Failure detail or dedupe marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch result carrying the transient flag for backoff decisions.
struct BatchResult {
    /// The externally visible item.
    item: ReplayBulkItem,
    /// Whether the failure was transient (false for successes).
    #[allow(dead_code, reason = "not yet consumed by callers; see BUILD_FLAGS.json unresolved")]
    transient: bool,
}

/// Runs one batch through the bounded worker pool.
///
/// Work enters through a channel whose capacity is the in-flight cap; no
/// new unit is handed out while `queue_size` units are unfinished.
fn run_replay_batch(
    state: &GatewayState,
    provider_slug: &str,
    rows: Vec<WebhookEvent>,
    workers: usize,
    queue_size: usize,
    request_id: &str,
) -> Vec<BatchResult> {
    if rows.is_empty() {
        return Vec::new();
    }
    let worker_count = workers.min(rows.len()).max(1);
    let (work_tx, work_rx) = mpsc::sync_channel::<WebhookEvent>(queue_size.max(1));
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (result_tx, result_rx) = mpsc::channel::<BatchResult>();
    thread::scope(|scope| {
        for _ in 0..worker_count {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                loop {
                    let next = {
                        let Ok(receiver) = work_rx.lock() else {
                            return;
                        };
                        receiver.recv()
                    };
                    let Ok(event) = next else {
                        return;
                    };
                    let result = match replay_event(state, provider_slug, &event, request_id) {
                        Ok(event_type) => BatchResult {
                            item: ReplayBulkItem {
                                event_key: event.event_key.clone(),
                                status: "replayed".to_string(),
                                event_type: Some(event_type),
                                error: None,
                            },
                            transient: false,
                        },
                        Err(failure) => BatchResult {
                            item: ReplayBulkItem {
                                event_key: event.event_key.clone(),
                                status: "replay_failed".to_string(),
                                event_type: Some(event.event_type.clone()),
                                error: Some(failure.detail.to_string()),
                            },
                            transient: failure.retryable,
                        },
                    };
                    if result_tx.send(result).is_err() {
                        return;
                    }
                }
            });
        }
        drop(result_tx);
        for event in rows {
            if work_tx.send(event).is_err() {
                break;
            }
        }
        drop(work_tx);
        result_rx.iter().collect()
    })
}

/// Aggregated counters for a bulk run.
#[derive(Debug, Default)]
struct BulkCounters {
    /// Events replayed successfully.
    replayed: usize,
    /// Keys with no replayable row.
    not_found: usize,
    /// Replays that failed.
    failed: usize,
}

/// Adaptive inter-batch sleep state.
struct SleepState {
    /// Current sleep duration in milliseconds.
    current_ms: f64,
    /// Floor in milliseconds.
    floor_ms: f64,
    /// Ceiling in milliseconds.
    ceil_ms: f64,
    /// Multiplier applied after failed batches.
    backoff: f64,
}

impl SleepState {
    /// Builds the sleep state from the configured controls.
    #[allow(clippy::cast_precision_loss, reason = "Sleep bounds stay far below 2^52 ms.")]
    fn new(controls: &ReplayControls) -> Self {
        Self {
            current_ms: controls.sleep_ms as f64,
            floor_ms: controls.sleep_ms as f64,
            ceil_ms: controls.max_sleep_ms as f64,
            backoff: controls.backoff_multiplier,
        }
    }

    /// Sleeps between batches and adapts to the batch outcome.
    fn pause_and_adapt(&mut self, batch_failed: bool) {
        if self.current_ms <= 0.0 {
            return;
        }
        thread::sleep(Duration::from_millis(to_millis(self.current_ms)));
        if batch_failed {
            self.current_ms = (self.current_ms * self.backoff).min(self.ceil_ms);
        } else {
            self.current_ms = (self.current_ms / self.backoff.max(1.0)).max(self.floor_ms);
        }
    }
}

/// Converts a non-negative float of milliseconds into a u64.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Value is clamped non-negative and bounded by the sleep ceiling."
)]
fn to_millis(value: f64) -> u64 {
    value.max(0.0) as u64
}

/// Runs a batched bulk replay over explicit event keys.
///
/// Duplicate keys inside the request replay once; extras answer
/// `duplicate_request_key_ignored`. When `require_dead_letter` is set, rows
/// that are not dead letters count as not found.
fn replay_keys_batched(
    state: &GatewayState,
    provider_slug: &str,
    event_keys: &[String],
    require_dead_letter: bool,
    controls: &ReplayControls,
    request_id: &str,
) -> (Vec<ReplayBulkItem>, BulkCounters) {
    let mut results = Vec::new();
    let mut counters = BulkCounters::default();
    let mut seen: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    let mut sleep = SleepState::new(controls);
    let batches: Vec<&[String]> = event_keys.chunks(controls.batch_size).collect();
    let batch_count = batches.len();
    for (index, batch) in batches.into_iter().enumerate() {
        let mut rows = Vec::new();
        for event_key in batch {
            if !seen.insert(event_key.clone()) {
                results.push(ReplayBulkItem {
                    event_key: event_key.clone(),
                    status: "replayed".to_string(),
                    event_type: None,
                    error: Some("duplicate_request_key_ignored".to_string()),
                });
                continue;
            }
            let row = state.store.get_event(provider_slug, event_key).ok().flatten();
            let replayable = row.filter(|event| !require_dead_letter || event.is_dead_letter());
            match replayable {
                Some(event) => rows.push(event),
                None => {
                    counters.not_found += 1;
                    results.push(ReplayBulkItem {
                        event_key: event_key.clone(),
                        status: "not_found".to_string(),
                        event_type: None,
                        error: None,
                    });
                }
            }
        }
        let batch_results = run_replay_batch(
            state,
            provider_slug,
            rows,
            controls.workers,
            controls.queue_size,
            request_id,
        );
        let mut batch_failed = false;
        for result in batch_results {
            if result.item.status == "replayed" {
                counters.replayed += 1;
                state
                    .metrics
                    .incr("webhook.dead_letter.replayed", &[("provider_slug", provider_slug)]);
            } else {
                counters.failed += 1;
                batch_failed = true;
                state.metrics.incr("webhook.replay_failed", &[("provider_slug", provider_slug)]);
            }
            results.push(result.item);
        }
        if index + 1 < batch_count {
            sleep.pause_and_adapt(batch_failed);
        }
    }
    (results, counters)
}

/// Runs a batched bulk replay over pre-selected rows.
fn replay_rows_batched(
    state: &GatewayState,
    provider_slug: &str,
    rows: Vec<WebhookEvent>,
    controls: &ReplayControls,
    request_id: &str,
) -> (Vec<ReplayBulkItem>, BulkCounters) {
    let mut results = Vec::new();
    let mut counters = BulkCounters::default();
    let mut sleep = SleepState::new(controls);
    let batches: Vec<Vec<WebhookEvent>> =
        rows.chunks(controls.batch_size).map(<[WebhookEvent]>::to_vec).collect();
    let batch_count = batches.len();
    for (index, batch) in batches.into_iter().enumerate() {
        let batch_results = run_replay_batch(
            state,
            provider_slug,
            batch,
            controls.workers,
            controls.queue_size,
            request_id,
        );
        let mut batch_failed = false;
        for result in batch_results {
            if result.item.status == "replayed" {
                counters.replayed += 1;
            } else {
                counters.failed += 1;
                batch_failed = true;
                state.metrics.incr("webhook.replay_failed", &[("provider_slug", provider_slug)]);
            }
            results.push(result.item);
        }
        if index + 1 < batch_count {
            sleep.pause_and_adapt(batch_failed);
        }
    }
    (results, counters)
}

/// Replays keys sequentially (providers without batching controls).
fn replay_keys_sequential(
    state: &GatewayState,
    provider_slug: &str,
    event_keys: &[String],
    request_id: &str,
) -> (Vec<ReplayBulkItem>, BulkCounters) {
    let mut results = Vec::new();
    let mut counters = BulkCounters::default();
    let mut seen: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for event_key in event_keys {
        if !seen.insert(event_key.clone()) {
            results.push(ReplayBulkItem {
                event_key: event_key.clone(),
                status: "replayed".to_string(),
                event_type: None,
                error: Some("duplicate_request_key_ignored".to_string()),
            });
            continue;
        }
        let Some(event) = state.store.get_event(provider_slug, event_key).ok().flatten() else {
            counters.not_found += 1;
            results.push(ReplayBulkItem {
                event_key: event_key.clone(),
                status: "not_found".to_string(),
                event_type: None,
                error: None,
            });
            continue;
        };
        match replay_event(state, provider_slug, &event, request_id) {
            Ok(event_type) => {
                counters.replayed += 1;
                results.push(ReplayBulkItem {
                    event_key: event_key.clone(),
                    status: "replayed".to_string(),
                    event_type: Some(event_type),
                    error: None,
                });
            }
            Err(failure) => {
                counters.failed += 1;
                state.metrics.incr("webhook.replay_failed", &[("provider_slug", provider_slug)]);
                results.push(ReplayBulkItem {
                    event_key: event_key.clone(),
                    status: "replay_failed".to_string(),
                    event_type: Some(event.event_type.clone()),
                    error: Some(failure.detail.to_string()),
                });
            }
        }
    }
    (results, counters)
}

// ============================================================================
// SECTION: Event Listing Endpoints
// ============================================================================

/// Query parameters for the event listing.
#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    /// Restrict to one provider slug.
    pub provider_slug: Option<String>,
    /// Restrict to one event type.
    pub event_type: Option<String>,
    /// Restrict to one organization.
    pub org_id: Option<String>,
    /// Restrict to one company.
    pub company_id: Option<String>,
    /// Maximum rows (bounded to 200).
    pub limit: Option<usize>,
    /// Rows skipped before returning.
    pub offset: Option<usize>,
}

/// Lists stored webhook events (super-admin).
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure or unsupported provider.
pub async fn list_webhook_events(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<EventListQuery>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    if let Some(provider_slug) = &query.provider_slug
        && !is_supported_provider(provider_slug)
    {
        return Err(ApiError::bad_request("Unsupported provider"));
    }
    let filter = EventFilter {
        provider_slug: query.provider_slug.clone(),
        event_type: query.event_type.clone(),
        org_id: query.org_id.clone().map(OrgId::new),
        company_id: query.company_id.clone().map(CompanyId::new),
        limit: query.limit.unwrap_or(50).clamp(1, 200),
        offset: query.offset.unwrap_or(0),
        ..EventFilter::default()
    };
    let events = run_blocking(|| state.store.list_events(&filter))?;
    let rows: Vec<Value> = events.iter().map(event_summary).collect();
    log_event(
        state.log.as_ref(),
        "webhook_events_listed",
        None,
        &[
            ("provider_slug", json!(query.provider_slug)),
            ("event_type", json!(query.event_type)),
            ("org_id", json!(query.org_id)),
            ("company_id", json!(query.company_id)),
            ("returned", json!(rows.len())),
        ],
    );
    Ok(Json(json!(rows)).into_response())
}

/// Renders the listing summary for one event row.
fn event_summary(event: &WebhookEvent) -> Value {
    json!({
        "id": event.id,
        "provider_slug": event.provider_slug,
        "event_key": event.event_key,
        "event_type": event.event_type,
        "status": event.status,
        "org_id": event.org_id,
        "company_id": event.company_id,
        "replay_count": event.replay_count,
        "last_replay_at": event.last_replay_at,
        "last_error": event.last_error,
        "processed_at": event.processed_at,
        "created_at": event.created_at,
    })
}

/// Query parameters for the dead-letter listing.
#[derive(Debug, Deserialize)]
pub struct DeadLetterListQuery {
    /// Inclusive lower bound on creation time.
    pub from_ts: Option<String>,
    /// Inclusive upper bound on creation time.
    pub to_ts: Option<String>,
    /// Filter on the dead-letter reason label.
    pub reason: Option<String>,
    /// `all`, `pending`, or `replayed`.
    pub replay_status: Option<String>,
    /// Restrict to one organization.
    pub org_id: Option<String>,
    /// Maximum rows (bounded to 200).
    pub limit: Option<usize>,
    /// Rows skipped before returning.
    pub offset: Option<usize>,
}

/// Lists direct-mail dead letters with windowed filters (super-admin).
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure or invalid filters.
pub async fn list_dead_letters(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<DeadLetterListQuery>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    let from_ts = query.from_ts.as_deref().and_then(parse_rfc3339);
    let to_ts = query.to_ts.as_deref().and_then(parse_rfc3339);
    if let (Some(from), Some(to)) = (from_ts, to_ts) {
        if from > to {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                json!({
                    "type": "invalid_filter",
                    "message": "from_ts must be before or equal to to_ts",
                }),
            ));
        }
        if (to - from).whole_days() > MAX_WINDOW_DAYS {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                json!({
                    "type": "invalid_filter",
                    "message": format!("date range exceeds {MAX_WINDOW_DAYS} days"),
                }),
            ));
        }
    }
    let replay_status = query.replay_status.as_deref().unwrap_or("all");
    if !matches!(replay_status, "all" | "pending" | "replayed") {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            json!({
                "type": "invalid_filter",
                "message": "replay_status must be one of: all, pending, replayed",
            }),
        ));
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0);

    let events = run_blocking(|| {
        state.store.list_events(&EventFilter {
            provider_slug: Some("lob".to_string()),
            org_id: query.org_id.clone().map(OrgId::new),
            from_ts: query.from_ts.clone(),
            to_ts: query.to_ts.clone(),
            limit: usize::MAX >> 1,
            offset: 0,
            ..EventFilter::default()
        })
    })?;
    let mut rows = Vec::new();
    for event in events {
        if !event.is_dead_letter() {
            continue;
        }
        match replay_status {
            "pending" if event.status != WebhookEventStatus::DeadLetter => continue,
            "replayed" if event.status != WebhookEventStatus::Replayed => continue,
            _ => {}
        }
        let meta = event.dead_letter_meta();
        let dl_reason = meta.and_then(|dl| dl.get("reason")).and_then(Value::as_str);
        if let Some(reason) = &query.reason
            && dl_reason != Some(reason.as_str())
        {
            continue;
        }
        rows.push(json!({
            "provider_slug": "lob",
            "event_key": event.event_key,
            "event_type": event.event_type,
            "status": event.status,
            "org_id": event.org_id,
            "company_id": event.company_id,
            "dead_letter_reason": dl_reason,
            "dead_letter_retryable": meta.and_then(|dl| dl.get("retryable")),
            "last_error": event.last_error,
            "replay_count": event.replay_count,
            "created_at": event.created_at,
            "processed_at": event.processed_at,
        }));
    }
    let page: Vec<Value> = rows.into_iter().skip(offset).take(limit).collect();
    Ok(Json(json!(page)).into_response())
}

/// Fetches one dead letter with its full payload (super-admin).
///
/// # Errors
///
/// Returns 404 when the event is absent or not a dead letter.
pub async fn dead_letter_detail(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(event_key): Path<String>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    let event = run_blocking(|| state.store.get_event("lob", &event_key))?
        .filter(WebhookEvent::is_dead_letter)
        .ok_or_else(|| ApiError::not_found("Dead-letter event not found"))?;
    let meta = event.dead_letter_meta();
    Ok(Json(json!({
        "provider_slug": "lob",
        "event_key": event.event_key,
        "event_type": event.event_type,
        "status": event.status,
        "org_id": event.org_id,
        "company_id": event.company_id,
        "dead_letter_reason": meta.and_then(|dl| dl.get("reason")),
        "dead_letter_retryable": meta.and_then(|dl| dl.get("retryable")),
        "replay_count": event.replay_count,
        "last_error": event.last_error,
        "payload": event.payload,
        "created_at": event.created_at,
        "processed_at": event.processed_at,
    }))
    .into_response())
}

// ============================================================================
// SECTION: Replay Endpoints
// ============================================================================

/// Replays one event by provider and key (super-admin).
///
/// # Errors
///
/// Returns 400 for unsupported providers, 404 for unknown events, and 500
/// with `webhook_replay_failed` when the projection fails again.
pub async fn replay_single(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Path((provider_slug, event_key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    if !is_supported_provider(&provider_slug) {
        return Err(ApiError::bad_request("Unsupported provider"));
    }
    let event = run_blocking(|| state.store.get_event(&provider_slug, &event_key))?
        .ok_or_else(|| ApiError::not_found("Webhook event not found"))?;
    let outcome =
        run_blocking(|| replay_event(&state, &provider_slug, &event, request_id.as_str()));
    match outcome {
        Ok(event_type) => Ok(Json(json!({
            "status": "replayed",
            "provider_slug": provider_slug,
            "event_key": event_key,
            "event_type": event_type,
        }))
        .into_response()),
        Err(failure) => {
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, failure.detail))
        }
    }
}

/// Body for the dead-letter replay endpoint.
#[derive(Debug, Deserialize)]
pub struct DeadLetterReplayRequest {
    /// Dead-letter event keys to replay.
    pub event_keys: Vec<String>,
}

/// Replays direct-mail dead letters in bounded batches (super-admin).
///
/// # Errors
///
/// Returns 400 for empty requests or runs exceeding the configured cap.
pub async fn replay_dead_letters(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<DeadLetterReplayRequest>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    if body.event_keys.is_empty() {
        return Err(ApiError::bad_request("event_keys cannot be empty"));
    }
    let controls = state.settings.replay;
    if body.event_keys.len() > controls.max_events_per_run {
        return Err(ApiError::bad_request(format!(
            "Requested replay count exceeds max events per run ({})",
            controls.max_events_per_run
        )));
    }
    let (results, counters) = run_blocking(|| {
        let outcome = replay_keys_batched(
            &state,
            "lob",
            &body.event_keys,
            true,
            &controls,
            request_id.as_str(),
        );
        persist_gateway_snapshot(&state, "lob_dead_letter_replay", Some(request_id.as_str()));
        outcome
    });
    log_event(
        state.log.as_ref(),
        "dead_letter_replay_completed",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!("lob")),
            ("requested", json!(body.event_keys.len())),
            ("replayed", json!(counters.replayed)),
            ("not_found", json!(counters.not_found)),
            ("failed", json!(counters.failed)),
        ],
    );
    Ok(Json(json!({
        "requested": body.event_keys.len(),
        "replayed": counters.replayed,
        "not_found": counters.not_found,
        "failed": counters.failed,
        "results": results,
    }))
    .into_response())
}

/// Body for the bulk replay endpoint.
#[derive(Debug, Deserialize)]
pub struct ReplayBulkRequest {
    /// Provider the keys belong to.
    pub provider_slug: String,
    /// Event keys to replay.
    pub event_keys: Vec<String>,
}

/// Replays an explicit key list (super-admin).
///
/// Direct-mail runs use the batched backoff machine; other providers run
/// sequentially.
///
/// # Errors
///
/// Returns 400 for empty requests, unsupported providers, or runs
/// exceeding the configured cap.
pub async fn replay_bulk(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<ReplayBulkRequest>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    if body.event_keys.is_empty() {
        return Err(ApiError::bad_request("event_keys cannot be empty"));
    }
    if !is_supported_provider(&body.provider_slug) {
        return Err(ApiError::bad_request("Unsupported provider"));
    }
    let is_lob = body.provider_slug == "lob";
    let controls = state.settings.replay;
    if is_lob && body.event_keys.len() > controls.max_events_per_run {
        return Err(ApiError::bad_request(format!(
            "Requested replay count exceeds max events per run ({})",
            controls.max_events_per_run
        )));
    }
    let (results, counters) = run_blocking(|| {
        let outcome = if is_lob {
            replay_keys_batched(
                &state,
                &body.provider_slug,
                &body.event_keys,
                false,
                &controls,
                request_id.as_str(),
            )
        } else {
            replay_keys_sequential(
                &state,
                &body.provider_slug,
                &body.event_keys,
                request_id.as_str(),
            )
        };
        persist_gateway_snapshot(&state, "webhook_replay_bulk", Some(request_id.as_str()));
        outcome
    });
    state.metrics.incr("webhook.replays.bulk", &[("provider_slug", &body.provider_slug)]);
    log_event(
        state.log.as_ref(),
        "webhook_bulk_replay_completed",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!(body.provider_slug)),
            ("requested", json!(body.event_keys.len())),
            ("replayed", json!(counters.replayed)),
            ("not_found", json!(counters.not_found)),
            ("replay_failed", json!(counters.failed)),
        ],
    );
    Ok(Json(json!({
        "provider_slug": body.provider_slug,
        "requested": body.event_keys.len(),
        "replayed": counters.replayed,
        "not_found": counters.not_found,
        "results": results,
    }))
    .into_response())
}

/// Body for the query-driven replay endpoint.
#[derive(Debug, Deserialize)]
pub struct ReplayQueryRequest {
    /// Provider the query runs against.
    pub provider_slug: String,
    /// Restrict to one event type.
    pub event_type: Option<String>,
    /// Restrict to one organization.
    pub org_id: Option<String>,
    /// Restrict to one company.
    pub company_id: Option<String>,
    /// Inclusive lower bound on creation time.
    pub from_ts: Option<String>,
    /// Inclusive upper bound on creation time.
    pub to_ts: Option<String>,
    /// Maximum matched rows (bounded to 200).
    pub limit: Option<usize>,
}

/// Replays events matched by a stored-event query (super-admin).
///
/// # Errors
///
/// Returns 400 for unsupported providers or runs exceeding the configured
/// cap.
pub async fn replay_query(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<ReplayQueryRequest>,
) -> Result<Response, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    if !is_supported_provider(&body.provider_slug) {
        return Err(ApiError::bad_request("Unsupported provider"));
    }
    let is_lob = body.provider_slug == "lob";
    let controls = state.settings.replay;
    let limit = body.limit.unwrap_or(50).clamp(1, 200);
    let selected = run_blocking(|| {
        state.store.list_events(&EventFilter {
            provider_slug: Some(body.provider_slug.clone()),
            event_type: body.event_type.clone(),
            org_id: body.org_id.clone().map(OrgId::new),
            company_id: body.company_id.clone().map(CompanyId::new),
            from_ts: body.from_ts.clone(),
            to_ts: body.to_ts.clone(),
            limit,
            offset: 0,
            ..EventFilter::default()
        })
    })?;
    if is_lob && selected.len() > controls.max_events_per_run {
        return Err(ApiError::bad_request(format!(
            "Matched replay count exceeds max events per run ({})",
            controls.max_events_per_run
        )));
    }
    let matched = selected.len();
    let (results, counters) = run_blocking(|| {
        let outcome = if is_lob {
            replay_rows_batched(
                &state,
                &body.provider_slug,
                selected,
                &controls,
                request_id.as_str(),
            )
        } else {
            let keys: Vec<String> =
                selected.iter().map(|event| event.event_key.clone()).collect();
            replay_keys_sequential(&state, &body.provider_slug, &keys, request_id.as_str())
        };
        persist_gateway_snapshot(&state, "webhook_replay_query", Some(request_id.as_str()));
        outcome
    });
    state.metrics.incr("webhook.replays.query", &[("provider_slug", &body.provider_slug)]);
    log_event(
        state.log.as_ref(),
        "webhook_query_replay_completed",
        Some(request_id.as_str()),
        &[
            ("provider_slug", json!(body.provider_slug)),
            ("matched", json!(matched)),
            ("replayed", json!(counters.replayed)),
            ("replay_failed", json!(counters.failed)),
            ("limit", json!(limit)),
        ],
    );
    Ok(Json(json!({
        "provider_slug": body.provider_slug,
        "matched": matched,
        "replayed": counters.replayed,
        "results": results,
    }))
    .into_response())
}

#[cfg(test)]
mod tests;
