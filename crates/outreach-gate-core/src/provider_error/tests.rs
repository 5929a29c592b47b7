// crates/outreach-gate-core/src/provider_error/tests.rs
// ============================================================================
// Module: Provider Error Unit Tests
// Description: Unit tests for failure classification and external mapping.
// Purpose: Pin the transient/terminal split and the operator-facing body.
// Dependencies: outreach-gate-core
// ============================================================================

//! ## Overview
//! Pins status-code classification and the external error body shape.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use super::ErrorCategory;
use super::ProviderError;

#[test]
fn status_classification_split() {
    for status in [429_u16, 500, 502, 503, 504] {
        assert_eq!(ProviderError::category_for_status(status), ErrorCategory::Transient);
    }
    for status in [401_u16, 403, 404] {
        assert_eq!(ProviderError::category_for_status(status), ErrorCategory::Terminal);
    }
    assert_eq!(ProviderError::category_for_status(418), ErrorCategory::Unknown);
}

#[test]
fn transient_maps_to_503_retryable() {
    let err = ProviderError::transient("smartlead", "list_campaigns", "connect timeout");
    assert_eq!(err.http_status(), 503);
    assert!(err.retryable());
}

#[test]
fn terminal_and_unknown_map_to_502() {
    let terminal = ProviderError::terminal("lob", "create_postcard", "invalid api key");
    let unknown = ProviderError::unknown("heyreach", "list_campaigns", "weird response");
    assert_eq!(terminal.http_status(), 502);
    assert_eq!(unknown.http_status(), 502);
    assert!(!terminal.retryable());
    assert!(!unknown.retryable());
}

#[test]
fn detail_body_shape() {
    let err = ProviderError::transient("lob", "cancel_letter", "HTTP 503");
    let detail = err.detail();
    assert_eq!(detail["type"], "provider_error");
    assert_eq!(detail["provider"], "lob");
    assert_eq!(detail["operation"], "cancel_letter");
    assert_eq!(detail["category"], "transient");
    assert_eq!(detail["retryable"], true);
    assert_eq!(detail["message"], "HTTP 503");
}
