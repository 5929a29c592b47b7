// crates/outreach-gate-server/src/scope/tests.rs
// ============================================================================
// Module: Scope Resolution Unit Tests
// Description: Unit tests for effective company-scope decisions.
// Purpose: Pin the 400/403/404 matrix for tenant isolation.
// Dependencies: outreach-gate-server
// ============================================================================

//! ## Overview
//! Covers the full decision matrix: scoped callers, org admins, members
//! acting at org level, and contradictory inputs.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use axum::http::StatusCode;
use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::UserId;

use super::CompanyScope;
use super::resolve_company_scope;
use crate::auth::AuthContext;
use crate::auth::Role;

fn caller(role: Role, company_id: Option<&str>) -> AuthContext {
    AuthContext {
        org_id: OrgId::new("org-1"),
        user_id: UserId::new("user-1"),
        role,
        company_id: company_id.map(CompanyId::new),
    }
}

#[test]
fn scoped_caller_defaults_to_own_company() {
    let auth = caller(Role::CompanyMember, Some("co-1"));
    let scope = resolve_company_scope(&auth, None, false, true).expect("scope");
    assert_eq!(scope, CompanyScope::Company(CompanyId::new("co-1")));
}

#[test]
fn scoped_caller_may_repeat_own_company() {
    let auth = caller(Role::CompanyAdmin, Some("co-1"));
    let scope = resolve_company_scope(&auth, Some(&CompanyId::new("co-1")), false, false)
        .expect("scope");
    assert_eq!(scope, CompanyScope::Company(CompanyId::new("co-1")));
}

#[test]
fn cross_company_probe_is_404() {
    let auth = caller(Role::CompanyAdmin, Some("co-1"));
    let err = resolve_company_scope(&auth, Some(&CompanyId::new("co-2")), false, false)
        .expect_err("probe");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[test]
fn org_admin_must_name_a_company() {
    let auth = caller(Role::OrgAdmin, None);
    let err = resolve_company_scope(&auth, None, false, false).expect_err("missing company");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    let scope = resolve_company_scope(&auth, Some(&CompanyId::new("co-9")), false, false)
        .expect("scope");
    assert_eq!(scope, CompanyScope::Company(CompanyId::new("co-9")));
}

#[test]
fn org_admin_all_companies_where_allowed() {
    let auth = caller(Role::OrgAdmin, None);
    let scope = resolve_company_scope(&auth, None, true, true).expect("scope");
    assert_eq!(scope, CompanyScope::AllCompanies);
    assert!(scope.company_filter().is_none());
    let err = resolve_company_scope(&auth, None, true, false).expect_err("not allowed");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[test]
fn non_admin_org_level_caller_is_403() {
    let auth = caller(Role::CompanyMember, None);
    let err = resolve_company_scope(&auth, Some(&CompanyId::new("co-1")), false, false)
        .expect_err("forbidden");
    assert_eq!(err.status, StatusCode::FORBIDDEN);
}

#[test]
fn all_companies_with_company_id_is_400() {
    let auth = caller(Role::OrgAdmin, None);
    let err = resolve_company_scope(&auth, Some(&CompanyId::new("co-1")), true, true)
        .expect_err("contradiction");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[test]
fn scoped_caller_cannot_request_all_companies() {
    let auth = caller(Role::CompanyAdmin, Some("co-1"));
    let err = resolve_company_scope(&auth, None, true, true).expect_err("rejected");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}
