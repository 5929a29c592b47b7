// crates/outreach-gate-core/src/event_key.rs
// ============================================================================
// Module: Webhook Event Keys
// Description: Deterministic event-key derivation for webhook deliveries.
// Purpose: Give every delivery a provider-stable identity for idempotency.
// Dependencies: serde_json, sha2
// ============================================================================

//! ## Overview
//! The event store deduplicates on `(provider_slug, event_key)`, so key
//! derivation must be deterministic across redeliveries. Preference order:
//! a provider-supplied event id, a provider-specific composite, then a
//! SHA-256 of the raw body. For direct mail, an explicit `id` wins over the
//! `<resource>:<type>:<date_created>` composite; a resend carrying the same
//! composite but a different `id` is therefore a distinct event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::hashing::sha256_hex;
use crate::payload::extract_lob_event_timestamp;
use crate::payload::extract_lob_resource_id;

// ============================================================================
// SECTION: Key Derivation
// ============================================================================

/// Computes the event key for a generic provider delivery.
///
/// Uses the provider-supplied `event_id` or `id` when present, otherwise the
/// SHA-256 hex of the raw body.
#[must_use]
pub fn compute_event_key(payload: &Value, raw_body: &[u8]) -> String {
    let map = payload.as_object();
    for key in ["event_id", "id"] {
        let explicit = map.and_then(|fields| fields.get(key)).and_then(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        });
        if let Some(explicit) = explicit {
            return explicit;
        }
    }
    sha256_hex(raw_body)
}

/// Computes the composite event key for a direct-mail delivery.
///
/// Preference order: `lob:<id>` from the explicit event identity,
/// `lob:<resource_id>:<type>:<date_created>` when all three parts resolve,
/// then `lob:<sha256(raw_body)>`.
#[must_use]
pub fn compute_lob_event_key(payload: &Value, raw_body: &[u8]) -> String {
    let map = payload.as_object();
    for key in ["id", "event_id"] {
        let explicit = map.and_then(|fields| fields.get(key)).and_then(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        });
        if let Some(explicit) = explicit {
            return format!("lob:{explicit}");
        }
    }
    let resource_id = extract_lob_resource_id(payload);
    let event_type = map
        .and_then(|fields| {
            fields.get("type").or_else(|| fields.get("event_type")).or_else(|| fields.get("event"))
        })
        .and_then(Value::as_str);
    let timestamp = extract_lob_event_timestamp(payload);
    if let (Some(resource_id), Some(event_type), Some(timestamp)) =
        (resource_id, event_type, timestamp)
    {
        return format!("lob:{resource_id}:{event_type}:{timestamp}");
    }
    format!("lob:{}", sha256_hex(raw_body))
}

#[cfg(test)]
mod tests;
