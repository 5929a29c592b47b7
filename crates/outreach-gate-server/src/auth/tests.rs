// crates/outreach-gate-server/src/auth/tests.rs
// ============================================================================
// Module: Auth Unit Tests
// Description: Unit tests for bearer parsing and principal resolution.
// Purpose: Validate fail-closed authentication decisions.
// Dependencies: outreach-gate-server
// ============================================================================

//! ## Overview
//! Exercises token parsing, principal matching, super-admin separation, and
//! the scheduler-secret check.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use outreach_gate_config::AuthSettings;
use outreach_gate_config::PrincipalSettings;

use super::Role;
use super::authenticate;
use super::authenticate_super_admin;
use super::parse_bearer_token;
use super::secrets_match;
use super::verify_scheduler_secret;

fn headers_with_bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
    );
    headers
}

fn sample_settings() -> AuthSettings {
    AuthSettings {
        super_admin_tokens: vec!["root-token".to_string()],
        principals: vec![
            PrincipalSettings {
                token: "tok-admin".to_string(),
                org_id: "org-1".to_string(),
                user_id: "user-1".to_string(),
                role: "org_admin".to_string(),
                company_id: None,
            },
            PrincipalSettings {
                token: "tok-member".to_string(),
                org_id: "org-1".to_string(),
                user_id: "user-2".to_string(),
                role: "company_member".to_string(),
                company_id: Some("co-1".to_string()),
            },
        ],
    }
}

#[test]
fn bearer_parsing() {
    assert_eq!(parse_bearer_token(Some("Bearer abc")), Some("abc".to_string()));
    assert_eq!(parse_bearer_token(Some("bearer abc ")), Some("abc".to_string()));
    assert!(parse_bearer_token(Some("Basic abc")).is_none());
    assert!(parse_bearer_token(Some("Bearer ")).is_none());
    assert!(parse_bearer_token(None).is_none());
}

#[test]
fn constant_time_compare_requires_equal_length() {
    assert!(secrets_match("abc", "abc"));
    assert!(!secrets_match("abc", "abd"));
    assert!(!secrets_match("abc", "abcd"));
}

#[test]
fn principal_resolution() {
    let settings = sample_settings();
    let admin =
        authenticate(&settings, &headers_with_bearer("tok-admin")).expect("admin context");
    assert_eq!(admin.role, Role::OrgAdmin);
    assert!(admin.company_id.is_none());

    let member =
        authenticate(&settings, &headers_with_bearer("tok-member")).expect("member context");
    assert_eq!(member.role, Role::CompanyMember);
    assert_eq!(member.company_id.as_ref().map(ToString::to_string), Some("co-1".to_string()));
}

#[test]
fn unknown_token_is_401() {
    let settings = sample_settings();
    let err = authenticate(&settings, &headers_with_bearer("tok-wrong")).expect_err("rejected");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    let err = authenticate(&settings, &HeaderMap::new()).expect_err("missing header");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[test]
fn super_admin_tokens_are_separate() {
    let settings = sample_settings();
    assert!(authenticate_super_admin(&settings, &headers_with_bearer("root-token")).is_ok());
    // Tenant tokens never grant the operator surface.
    let err = authenticate_super_admin(&settings, &headers_with_bearer("tok-admin"))
        .expect_err("rejected");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[test]
fn scheduler_secret_check() {
    let mut headers = HeaderMap::new();
    headers.insert("x-internal-scheduler-secret", HeaderValue::from_static("s3cret"));
    assert!(verify_scheduler_secret(Some("s3cret"), &headers).is_ok());

    let err = verify_scheduler_secret(None, &headers).expect_err("unconfigured");
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

    let err = verify_scheduler_secret(Some("other"), &headers).expect_err("mismatch");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);

    let err = verify_scheduler_secret(Some("s3cret"), &HeaderMap::new()).expect_err("missing");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}
