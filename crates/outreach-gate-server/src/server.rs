// crates/outreach-gate-server/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: Shared state, router assembly, and the HTTP serve loop.
// Purpose: Wire every surface into one axum application.
// Dependencies: axum, tokio, outreach-gate-{config,core,store-sqlite}
// ============================================================================

//! ## Overview
//! [`GatewayState`] carries the settings, store, metrics registry, log sink,
//! and the provider-poller factory used by reconciliation. The router mounts
//! every surface under its contract path, and a small middleware assigns or
//! echoes `X-Request-ID` on every response. Store and provider work is
//! blocking; [`run_blocking`] shifts it onto the runtime's blocking pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Extension;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use outreach_gate_config::GatewaySettings;
use outreach_gate_core::Capability;
use outreach_gate_store_sqlite::GatewayStoreConfig;
use outreach_gate_store_sqlite::SqliteGatewayStore;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::api::ApiError;
use crate::auth::authenticate_super_admin;
use crate::log::LogSink;
use crate::log::StderrLogSink;
use crate::metrics::MetricsRegistry;
use crate::metrics::emit_slo_hooks;
use crate::metrics::persist_snapshot;
use crate::reconciliation;
use crate::reconciliation::PollerFactory;
use crate::reconciliation::adapter_poller_factory;
use crate::replay;
use crate::webhooks;
use crate::writes;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for every handler.
pub struct GatewayState {
    /// Resolved gateway settings.
    pub settings: GatewaySettings,
    /// Durable store.
    pub store: Arc<SqliteGatewayStore>,
    /// In-process counter registry.
    pub metrics: Arc<MetricsRegistry>,
    /// Structured log sink.
    pub log: Arc<dyn LogSink>,
    /// Factory building provider pollers for reconciliation.
    pub pollers: PollerFactory,
}

impl GatewayState {
    /// Builds state with the production log sink and adapter pollers.
    #[must_use]
    pub fn new(settings: GatewaySettings, store: Arc<SqliteGatewayStore>) -> Self {
        Self {
            settings,
            store,
            metrics: Arc::new(MetricsRegistry::new()),
            log: Arc::new(StderrLogSink),
            pollers: adapter_poller_factory(),
        }
    }
}

/// Emits SLO hooks and persists the current counter snapshot.
pub fn persist_gateway_snapshot(state: &GatewayState, source: &str, request_id: Option<&str>) {
    emit_slo_hooks(&state.metrics, &state.settings.slo, state.log.as_ref(), request_id, source);
    persist_snapshot(
        &state.metrics,
        &state.store,
        &state.settings.export,
        state.log.as_ref(),
        source,
        request_id,
        false,
    );
}

/// Runs blocking work, shifting onto the blocking pool when possible.
pub fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

// ============================================================================
// SECTION: Request Identity
// ============================================================================

/// Request identifier assigned or echoed for every request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reads the client-supplied request id, else generates one; always echoes
/// `X-Request-ID` on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let incoming = ["x-request-id", "x-correlation-id"].iter().find_map(|name| {
        request
            .headers()
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    });
    let request_id = incoming.unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(request_id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

// ============================================================================
// SECTION: Observability Endpoints
// ============================================================================

/// Query parameters for the snapshot listing.
#[derive(Debug, Deserialize)]
pub struct SnapshotListQuery {
    /// Maximum rows returned (bounded to 200).
    pub limit: Option<usize>,
    /// Rows skipped before returning.
    pub offset: Option<usize>,
}

/// Lists persisted metrics snapshots (super-admin).
///
/// # Errors
///
/// Returns [`ApiError`] on auth or storage failure.
pub async fn list_metrics_snapshots(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<SnapshotListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0);
    let snapshots = run_blocking(|| state.store.list_metrics_snapshots(limit, offset))?;
    Ok(Json(json!(snapshots)))
}

/// Body for the snapshot flush endpoint.
#[derive(Debug, Deserialize)]
pub struct SnapshotFlushRequest {
    /// Label for the persisted snapshot.
    pub source: Option<String>,
    /// Whether counters reset after a successful persist.
    pub reset_after_persist: Option<bool>,
}

/// Persists the current counters on demand (super-admin).
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure.
pub async fn flush_metrics_snapshot(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<SnapshotFlushRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authenticate_super_admin(&state.settings.auth, &headers)?;
    let source = body.source.unwrap_or_else(|| "super_admin_flush".to_string());
    let reset_after_persist = body.reset_after_persist.unwrap_or(false);
    let counter_count = state.metrics.snapshot().len();
    let persisted = run_blocking(|| {
        emit_slo_hooks(
            &state.metrics,
            &state.settings.slo,
            state.log.as_ref(),
            Some(request_id.as_str()),
            &source,
        );
        persist_snapshot(
            &state.metrics,
            &state.store,
            &state.settings.export,
            state.log.as_ref(),
            &source,
            Some(request_id.as_str()),
            reset_after_persist,
        )
    });
    Ok(Json(json!({
        "persisted": persisted,
        "source": source,
        "counter_count": counter_count,
    })))
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Assembles the full gateway router over shared state.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/webhooks/smartlead", post(webhooks::ingest_smartlead))
        .route("/webhooks/heyreach", post(webhooks::ingest_heyreach))
        .route("/webhooks/emailbison", post(webhooks::ingest_emailbison_without_token))
        .route("/webhooks/emailbison/{path_token}", post(webhooks::ingest_emailbison))
        .route("/webhooks/lob", post(webhooks::ingest_lob))
        .route("/webhooks/events", get(replay::list_webhook_events))
        .route("/webhooks/dead-letters", get(replay::list_dead_letters))
        .route("/webhooks/dead-letters/replay", post(replay::replay_dead_letters))
        .route("/webhooks/dead-letters/{event_key}", get(replay::dead_letter_detail))
        .route("/webhooks/replay/{provider_slug}/{event_key}", post(replay::replay_single))
        .route("/webhooks/replay-bulk", post(replay::replay_bulk))
        .route("/webhooks/replay-query", post(replay::replay_query))
        .route(
            "/internal/reconciliation/campaigns-leads",
            post(reconciliation::run_reconciliation_endpoint),
        )
        .route(
            "/internal/reconciliation/run-scheduled",
            post(reconciliation::run_scheduled_endpoint),
        )
        .route("/super-admin/observability/metrics-snapshots", get(list_metrics_snapshots))
        .route(
            "/super-admin/observability/metrics-snapshots/flush",
            post(flush_metrics_snapshot),
        )
        .route("/campaigns", post(writes::create_campaign))
        .route("/campaigns/{campaign_id}/status", post(writes::update_campaign_status))
        .route("/campaigns/{campaign_id}/leads", post(writes::add_campaign_leads))
        .route("/direct-mail/pieces", post(writes::create_direct_mail_piece))
        .route("/direct-mail/pieces/{piece_id}/cancel", post(writes::cancel_direct_mail_piece))
        .route("/inboxes", get(writes::list_inboxes))
        .route("/inboxes/sync", post(writes::sync_inboxes))
        .route("/inboxes/{inbox_id}/warmup", post(writes::set_inbox_warmup))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Gateway server lifecycle errors.
#[derive(Debug, Error)]
pub enum GatewayServerError {
    /// Configuration prevented startup.
    #[error("gateway config error: {0}")]
    Config(String),
    /// Initialization failed.
    #[error("gateway init error: {0}")]
    Init(String),
    /// The HTTP transport failed.
    #[error("gateway transport error: {0}")]
    Transport(String),
}

/// The long-running gateway process.
pub struct GatewayServer {
    /// Shared handler state.
    state: Arc<GatewayState>,
}

impl GatewayServer {
    /// Builds a server from settings: opens the store and seeds the
    /// provider registry rows.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when the database path is missing or
    /// the store cannot be opened.
    pub fn from_settings(settings: GatewaySettings) -> Result<Self, GatewayServerError> {
        let db_path = settings
            .require_db_path()
            .map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let store = SqliteGatewayStore::new(&GatewayStoreConfig::new(db_path))
            .map_err(|err| GatewayServerError::Init(err.to_string()))?;
        let store = Arc::new(store);
        seed_providers(&store)?;
        Ok(Self {
            state: Arc::new(GatewayState::new(settings, store)),
        })
    }

    /// Returns the shared state (used by tests and embedders).
    #[must_use]
    pub fn state(&self) -> Arc<GatewayState> {
        Arc::clone(&self.state)
    }

    /// Serves HTTP until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), GatewayServerError> {
        let bind = self.state.settings.bind.clone();
        let addr: SocketAddr = bind
            .parse()
            .map_err(|_| GatewayServerError::Config(format!("invalid bind address: {bind}")))?;
        let app = router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| GatewayServerError::Transport(format!("bind failed: {err}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|err| GatewayServerError::Transport(format!("serve failed: {err}")))
    }
}

/// Seeds the provider registry rows the projection layer resolves against.
fn seed_providers(store: &SqliteGatewayStore) -> Result<(), GatewayServerError> {
    let seeds = [
        ("smartlead", Capability::EmailOutreach),
        ("emailbison", Capability::EmailOutreach),
        ("heyreach", Capability::LinkedinOutreach),
        ("lob", Capability::DirectMail),
    ];
    for (slug, capability) in seeds {
        store
            .upsert_provider(slug, capability)
            .map_err(|err| GatewayServerError::Init(err.to_string()))?;
    }
    Ok(())
}
