// crates/outreach-gate-providers/src/tests.rs
// ============================================================================
// Module: Provider Adapter Unit Tests
// Description: Unit tests for the shared call machinery and adapters.
// Purpose: Validate retry, fallback, classification, and idempotency rules.
// Dependencies: outreach-gate-providers, tiny_http
// ============================================================================

//! ## Overview
//! Spins throwaway `tiny_http` servers to exercise candidate-path fallback,
//! retry-on-retryable-status, auth classification, and envelope unwrapping.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::thread;

use outreach_gate_core::provider_error::ErrorCategory;
use reqwest::Method;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;

use crate::http::ProviderCall;
use crate::http::build_client;
use crate::http::expect_array;
use crate::http::request_json;
use crate::http::unwrap_data;
use crate::lob::IdempotencyMaterial;
use crate::registry::capability_for_slug;
use crate::registry::is_supported_provider;

/// Starts a server that answers scripted `(status, body)` responses in order.
fn scripted_server(responses: Vec<(u16, &'static str)>) -> String {
    let server = Server::http("127.0.0.1:0").expect("bind test server");
    let addr = server.server_addr().to_ip().expect("ip addr");
    let url = format!("http://{addr}");
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok(request) = server.recv() else {
                return;
            };
            let _ = request.respond(Response::from_string(body).with_status_code(status));
        }
    });
    url
}

#[test]
fn candidate_fallback_skips_404() {
    let url = scripted_server(vec![(404, "not here"), (200, r#"{"data": [1, 2]}"#)]);
    let mut call = ProviderCall::new(
        "smartlead",
        "list_campaigns",
        Method::GET,
        format!("{url}/old"),
    );
    call.candidate_urls = vec![format!("{url}/old"), format!("{url}/new")];
    let client = build_client("smartlead").expect("client");
    let value = request_json(&client, &call).expect("response");
    assert_eq!(unwrap_data(value), json!([1, 2]));
}

#[test]
fn retryable_status_is_retried_then_succeeds() {
    let url = scripted_server(vec![(503, "busy"), (200, r#"{"ok": true}"#)]);
    let call =
        ProviderCall::new("lob", "list_postcards", Method::GET, format!("{url}/v1/postcards"));
    let client = build_client("lob").expect("client");
    let value = request_json(&client, &call).expect("response");
    assert_eq!(value, json!({"ok": true}));
}

#[test]
fn auth_rejection_is_terminal() {
    let url = scripted_server(vec![(401, "no")]);
    let call = ProviderCall::new("heyreach", "list_campaigns", Method::GET, url);
    let client = build_client("heyreach").expect("client");
    let err = request_json(&client, &call).expect_err("auth failure");
    assert_eq!(err.category, ErrorCategory::Terminal);
    assert!(err.message.contains("invalid heyreach api key"));
}

#[test]
fn exhausted_retryable_status_is_transient() {
    let url = scripted_server(vec![(500, "a"), (500, "b"), (500, "c")]);
    let call = ProviderCall::new("smartlead", "list_campaigns", Method::GET, url);
    let client = build_client("smartlead").expect("client");
    let err = request_json(&client, &call).expect_err("server failure");
    assert_eq!(err.category, ErrorCategory::Transient);
    assert!(err.retryable());
    assert!(err.message.contains("returned HTTP 500"));
}

#[test]
fn all_candidates_missing_is_terminal() {
    let url = scripted_server(vec![(404, "x"), (404, "y")]);
    let mut call = ProviderCall::new("smartlead", "list_campaigns", Method::GET, url.clone());
    call.candidate_urls = vec![format!("{url}/a"), format!("{url}/b")];
    let client = build_client("smartlead").expect("client");
    let err = request_json(&client, &call).expect_err("missing endpoint");
    assert_eq!(err.category, ErrorCategory::Terminal);
    assert!(err.message.contains("endpoint not found"));
}

#[test]
fn non_json_body_is_terminal() {
    let url = scripted_server(vec![(200, "<html>hi</html>")]);
    let call = ProviderCall::new("lob", "get_postcard", Method::GET, url);
    let client = build_client("lob").expect("client");
    let err = request_json(&client, &call).expect_err("parse failure");
    assert_eq!(err.category, ErrorCategory::Terminal);
    assert!(err.message.contains("non-JSON response"));
}

#[test]
fn expect_array_accepts_common_wrappers() {
    assert_eq!(
        expect_array(json!([1]), "smartlead", "op").expect("bare array"),
        vec![json!(1)]
    );
    assert_eq!(
        expect_array(json!({"data": [2]}), "smartlead", "op").expect("data wrapper"),
        vec![json!(2)]
    );
    assert_eq!(
        expect_array(json!({"items": [3]}), "smartlead", "op").expect("items wrapper"),
        vec![json!(3)]
    );
    assert!(expect_array(json!({"other": 1}), "smartlead", "op").is_err());
    assert!(expect_array(json!("nope"), "smartlead", "op").is_err());
}

#[test]
fn idempotency_material_is_mutually_exclusive() {
    let both = IdempotencyMaterial {
        header_key: Some("k1".to_string()),
        query_key: Some("k2".to_string()),
    };
    let err = both.materialize("create_postcard").expect_err("contract violation");
    assert_eq!(err.category, ErrorCategory::Terminal);
    assert!(err.message.contains("cannot send both"));

    let (headers, query) = IdempotencyMaterial::header("k1")
        .materialize("create_postcard")
        .expect("header material");
    assert_eq!(headers, vec![("Idempotency-Key".to_string(), "k1".to_string())]);
    assert!(query.is_empty());

    let (headers, query) = IdempotencyMaterial::query("k2")
        .materialize("create_postcard")
        .expect("query material");
    assert!(headers.is_empty());
    assert_eq!(query, vec![("idempotency_key".to_string(), "k2".to_string())]);

    let empty = IdempotencyMaterial::header("  ");
    assert!(empty.materialize("create_postcard").is_err());
}

#[test]
fn registry_capability_table() {
    assert!(is_supported_provider("smartlead"));
    assert!(is_supported_provider("lob"));
    assert!(!is_supported_provider("sendgrid"));
    assert!(capability_for_slug("heyreach").is_some());
    assert!(capability_for_slug("mailchimp").is_none());
}
