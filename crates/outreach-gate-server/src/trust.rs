// crates/outreach-gate-server/src/trust.rs
// ============================================================================
// Module: Webhook Trust Policies
// Description: Per-provider trust decisions for inbound webhook deliveries.
// Purpose: Admit or reject hostile input before it reaches the event store.
// Dependencies: hmac, sha2, subtle, outreach-gate-config, outreach-gate-core
// ============================================================================

//! ## Overview
//! Three trust models guard ingestion. HMAC-signed sequencers verify
//! `HMAC-SHA256(secret, raw_body)` against a hex signature header when a
//! secret is configured. The direct-mail producer signs
//! `"<timestamp>.<raw_body>"` and is verified inside a replay window, in
//! either audit-only or enforcing mode. The unsigned-origin provider is
//! admitted by a secret URL path token plus an origin allowlist. All secret
//! comparisons are constant time; every rejection reason is a distinct
//! metric label.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::StatusCode;
use hmac::Hmac;
use hmac::Mac;
use outreach_gate_config::GatewaySettings;
use outreach_gate_config::LobSignatureMode;
use outreach_gate_core::hashing::hex_encode;
use outreach_gate_core::time::now_utc;
use outreach_gate_core::time::parse_signature_timestamp;
use serde_json::json;
use sha2::Sha256;
use url::Url;

use crate::api::ApiError;
use crate::auth::secrets_match;
use crate::log::LogSink;
use crate::log::log_event;
use crate::metrics::MetricsRegistry;

// ============================================================================
// SECTION: HMAC Helpers
// ============================================================================

/// Computes `HMAC-SHA256(secret, message)` as lowercase hex.
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(message);
    hex_encode(&mac.finalize().into_bytes())
}

/// Verifies an HMAC-signed delivery for the sequencer providers.
///
/// Passing no configured secret accepts the delivery (deployment choice).
///
/// # Errors
///
/// Returns 401 when the signature header is absent or does not match.
pub fn verify_hmac_or_reject(
    raw_body: &[u8],
    signature_header: Option<&str>,
    secret: Option<&str>,
) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let Some(signature) = signature_header else {
        return Err(ApiError::message(StatusCode::UNAUTHORIZED, "Missing webhook signature"));
    };
    let computed = hmac_sha256_hex(secret.as_bytes(), raw_body);
    if !secrets_match(&computed, signature.trim()) {
        return Err(ApiError::message(StatusCode::UNAUTHORIZED, "Invalid webhook signature"));
    }
    Ok(())
}

// ============================================================================
// SECTION: Replay-Window Signature (Direct Mail)
// ============================================================================

/// Outcome of direct-mail signature verification.
#[derive(Debug, Clone)]
pub struct LobSignatureResult {
    /// Verification mode in effect.
    pub mode: LobSignatureMode,
    /// Whether the signature verified.
    pub verified: bool,
    /// Verification reason label (`verified`, `missing_signature`, ...).
    pub reason: String,
    /// Raw timestamp header, when present.
    pub timestamp: Option<String>,
}

/// Builds the 401 rejection for a signature failure.
fn signature_rejection(reason: &str, message: &str) -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        json!({
            "type": "webhook_signature_invalid",
            "provider": "lob",
            "reason": reason,
            "message": message,
        }),
    )
}

/// Verifies a direct-mail delivery against the replay-window contract.
///
/// In `enforce` mode failures reject; in `permissive_audit` mode they are
/// audited and the delivery is accepted with `verified=false`.
///
/// # Errors
///
/// Returns 401 for signature failures in enforce mode and 503 when enforce
/// mode is configured without a secret.
pub fn verify_lob_signature(
    settings: &GatewaySettings,
    metrics: &MetricsRegistry,
    log: &dyn LogSink,
    headers: &HeaderMap,
    raw_body: &[u8],
    request_id: Option<&str>,
) -> Result<LobSignatureResult, ApiError> {
    let mode = settings.lob_signature_mode;
    let tolerance_seconds = settings.lob_signature_tolerance_seconds;
    let secret = settings.lob_webhook_secret.as_deref();
    let signature =
        headers.get("lob-signature").and_then(|value| value.to_str().ok()).map(str::trim);
    let timestamp_header = headers
        .get("lob-signature-timestamp")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let audit_failure = |reason: &str, message: &str| {
        metrics.incr(
            "webhook.signature.audit_failed",
            &[("provider_slug", "lob"), ("reason", reason), ("mode", mode.as_str())],
        );
        log_event(
            log,
            "webhook_signature_audit_failed",
            request_id,
            &[
                ("provider_slug", json!("lob")),
                ("reason", json!(reason)),
                ("mode", json!(mode.as_str())),
                ("message", json!(message)),
            ],
        );
        LobSignatureResult {
            mode,
            verified: false,
            reason: reason.to_string(),
            timestamp: timestamp_header.clone(),
        }
    };

    let reject = |reason: &str, message: &str| {
        metrics.incr(
            "webhook.signature.rejected",
            &[("provider_slug", "lob"), ("reason", reason)],
        );
        metrics.incr(
            "webhook.events.rejected",
            &[("provider_slug", "lob"), ("reason", reason)],
        );
        signature_rejection(reason, message)
    };

    if mode == LobSignatureMode::Enforce && secret.is_none() {
        metrics.incr("webhook.signature.enforce_config_error", &[("provider_slug", "lob")]);
        metrics.incr(
            "webhook.events.rejected",
            &[("provider_slug", "lob"), ("reason", "signature_configuration_error")],
        );
        log_event(
            log,
            "webhook_signature_enforce_config_error",
            request_id,
            &[("provider_slug", json!("lob")), ("mode", json!(mode.as_str()))],
        );
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "type": "webhook_signature_configuration_error",
                "provider": "lob",
                "message": "Webhook signature enforcement is enabled but secret is not configured",
            }),
        ));
    }

    let Some(secret) = secret else {
        return Ok(audit_failure("secret_not_configured", "Signature secret not configured"));
    };

    let Some(signature) = signature else {
        if mode == LobSignatureMode::Enforce {
            return Err(reject("missing_signature", "Missing Lob-Signature header"));
        }
        return Ok(audit_failure("missing_signature", "Missing Lob-Signature header"));
    };

    let Some(raw_timestamp) = timestamp_header.clone() else {
        if mode == LobSignatureMode::Enforce {
            return Err(reject("missing_timestamp", "Missing Lob-Signature-Timestamp header"));
        }
        return Ok(audit_failure(
            "missing_timestamp",
            "Missing Lob-Signature-Timestamp header",
        ));
    };

    let Some(parsed_timestamp) = parse_signature_timestamp(&raw_timestamp) else {
        if mode == LobSignatureMode::Enforce {
            return Err(reject(
                "invalid_timestamp",
                "Invalid Lob-Signature-Timestamp header format",
            ));
        }
        return Ok(audit_failure(
            "invalid_timestamp",
            "Invalid Lob-Signature-Timestamp header format",
        ));
    };

    let age_seconds = (now_utc() - parsed_timestamp).whole_seconds().abs();
    if tolerance_seconds > 0 && age_seconds > tolerance_seconds {
        if mode == LobSignatureMode::Enforce {
            return Err(reject(
                "stale_timestamp",
                "Lob-Signature-Timestamp is outside accepted tolerance window",
            ));
        }
        return Ok(audit_failure(
            "stale_timestamp",
            "Lob-Signature-Timestamp outside accepted tolerance window",
        ));
    }

    let mut signing_input = Vec::with_capacity(raw_timestamp.len() + 1 + raw_body.len());
    signing_input.extend_from_slice(raw_timestamp.as_bytes());
    signing_input.push(b'.');
    signing_input.extend_from_slice(raw_body);
    let expected = hmac_sha256_hex(secret.as_bytes(), &signing_input);
    if !secrets_match(&expected, signature) {
        if mode == LobSignatureMode::Enforce {
            return Err(reject("invalid_signature", "Lob webhook signature verification failed"));
        }
        return Ok(audit_failure(
            "invalid_signature",
            "Lob webhook signature verification failed",
        ));
    }

    metrics.incr(
        "webhook.signature.verified",
        &[("provider_slug", "lob"), ("mode", mode.as_str())],
    );
    Ok(LobSignatureResult {
        mode,
        verified: true,
        reason: "verified".to_string(),
        timestamp: timestamp_header,
    })
}

// ============================================================================
// SECTION: Unsigned-Origin Trust (EmailBison)
// ============================================================================

/// Extracts the origin host signal from request headers.
///
/// Preference order: `Origin`, `Referer`, `X-Forwarded-Host`, `Host`.
#[must_use]
pub fn request_origin_host(headers: &HeaderMap) -> Option<String> {
    for name in ["origin", "referer"] {
        if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok())
            && let Ok(parsed) = Url::parse(value)
            && let Some(host) = parsed.host_str()
        {
            return Some(host.to_ascii_lowercase());
        }
    }
    if let Some(forwarded) = headers.get("x-forwarded-host").and_then(|value| value.to_str().ok())
    {
        let host = forwarded.split(',').next().unwrap_or_default().trim().to_ascii_lowercase();
        if !host.is_empty() {
            return Some(host);
        }
    }
    if let Some(host_header) = headers.get("host").and_then(|value| value.to_str().ok()) {
        let host = host_header.split(':').next().unwrap_or_default().trim().to_ascii_lowercase();
        if !host.is_empty() {
            return Some(host);
        }
    }
    None
}

/// Returns true when a host is allowlisted exactly or as a subdomain.
#[must_use]
pub fn is_allowed_origin(origin_host: &str, allowlist: &[String]) -> bool {
    allowlist.iter().any(|allowed| {
        origin_host == allowed || origin_host.ends_with(&format!(".{allowed}"))
    })
}

/// Builds the structured 401 for an unsigned-origin trust failure.
fn emailbison_auth_failed(reason: &str, message: &str) -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        json!({
            "type": "webhook_auth_failed",
            "provider": "emailbison",
            "reason": reason,
            "message": message,
        }),
    )
}

/// Verifies the unsigned-origin trust contract.
///
/// Returns the admitted origin host for ingestion metadata.
///
/// # Errors
///
/// Returns 503 when no path token is configured and 401 for token or origin
/// failures.
pub fn verify_emailbison_contract(
    settings: &GatewaySettings,
    headers: &HeaderMap,
    path_token: &str,
) -> Result<String, ApiError> {
    let Some(configured_token) = settings.emailbison_path_token.as_deref() else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "type": "webhook_ingress_configuration_error",
                "provider": "emailbison",
                "message": "EMAILBISON_WEBHOOK_PATH_TOKEN is not configured",
            }),
        ));
    };
    if !secrets_match(path_token, configured_token) {
        return Err(emailbison_auth_failed(
            "invalid_path_token",
            "Invalid EmailBison webhook path token",
        ));
    }
    let Some(origin_host) = request_origin_host(headers) else {
        return Err(emailbison_auth_failed(
            "missing_origin",
            "Missing origin host signal for EmailBison webhook",
        ));
    };
    let allowlist = &settings.emailbison_allowed_origins;
    if allowlist.is_empty() || !is_allowed_origin(&origin_host, allowlist) {
        return Err(emailbison_auth_failed(
            "origin_not_allowed",
            "EmailBison webhook origin is not allowlisted",
        ));
    }
    Ok(origin_host)
}

#[cfg(test)]
mod tests;
