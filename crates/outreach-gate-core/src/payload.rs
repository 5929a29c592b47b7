// crates/outreach-gate-core/src/payload.rs
// ============================================================================
// Module: Webhook Payload Accessors
// Description: Tolerant field extraction over opaque provider payloads.
// Purpose: Pull routing hints out of untrusted JSON without imposing a schema.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Provider webhooks vary wildly in shape. Payloads stay opaque
//! [`serde_json::Value`] maps end to end; these accessors extract only what
//! routing needs (event type, campaign id, resource id, status hints) while
//! tolerating both snake_case and camelCase keys, nested wrappers, and
//! numeric-vs-string identifiers. Anything absent or malformed yields `None`
//! rather than an error. The one exception is the direct-mail schema check,
//! which reports exactly which required fields are missing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::normalize::looks_like_campaign_status;
use crate::normalize::looks_like_lead_status;

// ============================================================================
// SECTION: Generic Accessors
// ============================================================================

/// Returns a field as a display string, accepting strings and numbers.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Returns the first present key from the payload as a string.
fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    let map = payload.as_object()?;
    for key in keys {
        if let Some(value) = map.get(*key)
            && let Some(text) = value_to_string(value)
        {
            return Some(text);
        }
    }
    None
}

/// Returns a nested object field when present.
fn object_field<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    payload.as_object().and_then(|map| map.get(key)).filter(|value| value.is_object())
}

/// Extracts the event type with the standard fallback chain.
///
/// Checks `event`, `event_type`, then `type`; defaults to `unknown`.
#[must_use]
pub fn extract_event_type(payload: &Value) -> String {
    first_string(payload, &["event", "event_type", "type"])
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extracts the external campaign identifier.
///
/// Accepts `campaign_id`/`campaignId` at the top level or an `id` inside a
/// nested `campaign` object.
#[must_use]
pub fn extract_campaign_id(payload: &Value) -> Option<String> {
    if let Some(id) = first_string(payload, &["campaign_id", "campaignId"]) {
        return Some(id);
    }
    object_field(payload, "campaign").and_then(|campaign| first_string(campaign, &["id", "campaignId"]))
}

/// Extracts the external lead identifier.
#[must_use]
pub fn extract_lead_id(payload: &Value) -> Option<String> {
    if let Some(id) = first_string(payload, &["lead_id", "leadId"]) {
        return Some(id);
    }
    object_field(payload, "lead").and_then(|lead| first_string(lead, &["id", "leadId"]))
}

/// Extracts the external message identifier.
///
/// `id` is last in the chain: several providers reuse it for the event row.
#[must_use]
pub fn extract_message_id(payload: &Value) -> Option<String> {
    first_string(payload, &["message_id", "messageId", "email_stats_id", "id"])
}

/// Extracts a 1-based sequence step number when one is present and valid.
#[must_use]
pub fn extract_sequence_step_number(payload: &Value) -> Option<i64> {
    let map = payload.as_object()?;
    for key in ["sequence_step_number", "sequenceStepNumber", "step_number", "stepNumber", "seq_number"]
    {
        let Some(raw) = map.get(key) else {
            continue;
        };
        let parsed = match raw {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };
        if let Some(value) = parsed
            && value >= 1
        {
            return Some(value);
        }
    }
    None
}

/// Extracts the raw campaign status hint.
///
/// Prefers the explicit `campaign_status`/`campaignStatus` keys; falls back
/// to a bare `status` only when its value looks like campaign vocabulary.
#[must_use]
pub fn extract_campaign_status(payload: &Value) -> Option<String> {
    if let Some(status) = first_string(payload, &["campaign_status", "campaignStatus"]) {
        return Some(status);
    }
    first_string(payload, &["status"]).filter(|raw| looks_like_campaign_status(raw))
}

/// Extracts the raw lead status hint.
///
/// Prefers `lead_status`/`leadStatus`; falls back to a bare `status` only
/// when its value looks like lead vocabulary.
#[must_use]
pub fn extract_lead_status(payload: &Value) -> Option<String> {
    if let Some(status) = first_string(payload, &["lead_status", "leadStatus"]) {
        return Some(status);
    }
    first_string(payload, &["status"]).filter(|raw| looks_like_lead_status(raw))
}

// ============================================================================
// SECTION: Direct-Mail Accessors
// ============================================================================

/// Extracts the direct-mail resource (piece) identifier.
///
/// Checks the nested `body.resource.id` first, then the flat aliases used by
/// replayed and backfilled payloads.
#[must_use]
pub fn extract_lob_resource_id(payload: &Value) -> Option<String> {
    if let Some(body) = object_field(payload, "body")
        && let Some(resource) = object_field(body, "resource")
        && let Some(id) = first_string(resource, &["id"])
    {
        return Some(id);
    }
    first_string(payload, &["resource_id", "object_id", "piece_id", "mailpiece_id"])
}

/// Extracts the provider-supplied event timestamp for composite keys.
#[must_use]
pub fn extract_lob_event_timestamp(payload: &Value) -> Option<String> {
    first_string(payload, &["date_created", "created_at", "time"])
}

/// Extracts the payload schema version.
///
/// Direct-mail payloads are commonly unversioned; absent versions pin to the
/// `v1` baseline for deterministic handling.
#[must_use]
pub fn extract_lob_payload_version(payload: &Value) -> String {
    for key in ["version", "webhook_version", "schema_version"] {
        if let Some(value) = payload.as_object().and_then(|map| map.get(key))
            && let Value::String(text) = value
            && !text.trim().is_empty()
        {
            return text.trim().to_string();
        }
    }
    "v1".to_string()
}

/// Schema validation failure for a direct-mail payload.
///
/// # Invariants
/// - `reason()` yields the exact dead-letter reason label
///   (`schema_invalid` / `version_unsupported`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaValidationError {
    /// Required fields are missing; the payload cannot be routed.
    #[error("schema_invalid:{0}")]
    SchemaInvalid(String),
    /// The payload version is not in the configured supported set.
    #[error("version_unsupported:{0}")]
    VersionUnsupported(String),
}

impl SchemaValidationError {
    /// Returns the dead-letter reason label for this failure.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::SchemaInvalid(_) => "schema_invalid",
            Self::VersionUnsupported(_) => "version_unsupported",
        }
    }

    /// Returns the detail portion (missing fields or rejected version).
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::SchemaInvalid(fields) => fields,
            Self::VersionUnsupported(version) => version,
        }
    }
}

/// Validates a direct-mail payload against the baseline schema.
///
/// Requires `id` (or `event_id`), `type` (or aliases), `date_created` (or
/// aliases), and a resolvable resource identifier. The version must be in
/// `supported_versions`.
///
/// # Errors
///
/// Returns [`SchemaValidationError`] listing the missing fields or the
/// unsupported version.
pub fn validate_lob_payload_schema(
    payload: &Value,
    supported_versions: &[String],
) -> Result<String, SchemaValidationError> {
    let version = extract_lob_payload_version(payload);
    if !supported_versions.iter().any(|candidate| candidate == &version) {
        return Err(SchemaValidationError::VersionUnsupported(version));
    }
    let mut missing: Vec<&str> = Vec::new();
    if first_string(payload, &["id", "event_id"]).is_none() {
        missing.push("id");
    }
    if first_string(payload, &["type", "event_type", "event"]).is_none() {
        missing.push("type");
    }
    if extract_lob_event_timestamp(payload).is_none() {
        missing.push("date_created");
    }
    if extract_lob_resource_id(payload).is_none() {
        missing.push("resource.id");
    }
    if !missing.is_empty() {
        return Err(SchemaValidationError::SchemaInvalid(missing.join(",")));
    }
    Ok(version)
}

/// Extracts the direct-mail resource type hint (`postcard`, `letter`, ...).
#[must_use]
pub fn extract_lob_resource_type(payload: &Value) -> Option<String> {
    if let Some(body) = object_field(payload, "body")
        && let Some(resource) = object_field(body, "resource")
        && let Some(kind) = first_string(resource, &["object", "type"])
    {
        return Some(kind);
    }
    first_string(payload, &["resource_type"])
}

/// Extracts the nested resource object fields used by piece projection.
#[must_use]
pub fn extract_lob_resource(payload: &Value) -> Option<&Value> {
    object_field(payload, "body").and_then(|body| object_field(body, "resource"))
}

#[cfg(test)]
mod tests;
