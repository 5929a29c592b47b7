// crates/outreach-gate-server/src/api.rs
// ============================================================================
// Module: API Error Surface
// Description: Typed HTTP error with a structured JSON detail body.
// Purpose: Keep every error response on the `{detail: …}` wire shape.
// Dependencies: axum, serde_json, outreach-gate-core
// ============================================================================

//! ## Overview
//! Every failed request returns `{"detail": …}` where the detail is either a
//! plain message or a structured object (`webhook_auth_failed`,
//! `provider_error`, …). Handlers return `Result<impl IntoResponse, ApiError>`
//! and convert lower-layer failures through the helpers here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use outreach_gate_core::ProviderError;
use outreach_gate_store_sqlite::GatewayStoreError;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// HTTP error carrying a status code and a structured detail body.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Response status code.
    pub status: StatusCode,
    /// Detail body placed under the `detail` key.
    pub detail: Value,
}

impl ApiError {
    /// Builds an error with a structured detail object.
    #[must_use]
    pub const fn new(status: StatusCode, detail: Value) -> Self {
        Self {
            status,
            detail,
        }
    }

    /// Builds an error with a plain message detail.
    #[must_use]
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: Value::String(message.into()),
        }
    }

    /// 400 with a plain message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::message(StatusCode::BAD_REQUEST, message)
    }

    /// 404 with a plain message. Also used for cross-tenant probes so row
    /// existence never leaks.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::message(StatusCode::NOT_FOUND, message)
    }

    /// Maps a provider failure through the error envelope (503/502).
    #[must_use]
    pub fn from_provider(err: &ProviderError) -> Self {
        let status = StatusCode::from_u16(err.http_status())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, err.detail())
    }

    /// Maps a storage failure onto a 500 with an opaque detail.
    #[must_use]
    pub fn from_store(err: &GatewayStoreError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"type": "storage_error", "message": err.to_string()}),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"detail": self.detail}))).into_response()
    }
}

impl From<GatewayStoreError> for ApiError {
    fn from(err: GatewayStoreError) -> Self {
        Self::from_store(&err)
    }
}
