// crates/outreach-gate-server/src/auth.rs
// ============================================================================
// Module: Gateway Authn
// Description: Bearer-token authentication for tenant and operator surfaces.
// Purpose: Produce fail-closed caller contexts for every protected route.
// Dependencies: outreach-gate-config, outreach-gate-core, subtle
// ============================================================================

//! ## Overview
//! The auth middleware seam consumes configured token material: tenant
//! principals map a bearer token onto `(org, user, role, company?)`, and a
//! separate super-admin token list guards the operator surfaces. Token and
//! shared-secret comparisons are constant time. Everything downstream sees
//! only [`AuthContext`] / [`SuperAdminContext`]; the token itself survives as
//! a SHA-256 fingerprint for audit logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use outreach_gate_config::AuthSettings;
use outreach_gate_core::CompanyId;
use outreach_gate_core::OrgId;
use outreach_gate_core::UserId;
use outreach_gate_core::sha256_hex;
use subtle::ConstantTimeEq;

use crate::api::ApiError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header length.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Caller Contexts
// ============================================================================

/// Tenant role carried on authenticated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Organization administrator; may act across companies.
    OrgAdmin,
    /// Company administrator.
    CompanyAdmin,
    /// Company member.
    CompanyMember,
}

impl Role {
    /// Parses a configured role label, failing closed on unknown labels.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "org_admin" | "admin" => Some(Self::OrgAdmin),
            "company_admin" => Some(Self::CompanyAdmin),
            "company_member" | "member" => Some(Self::CompanyMember),
            _ => None,
        }
    }
}

/// Identity context for authenticated tenant requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Organization the caller acts for.
    pub org_id: OrgId,
    /// Caller user identity.
    pub user_id: UserId,
    /// Caller role.
    pub role: Role,
    /// Company scope; absent for org-level callers.
    pub company_id: Option<CompanyId>,
}

/// Identity context for super-admin requests. Operates above the tenant
/// layer, so it carries no organization.
#[derive(Debug, Clone)]
pub struct SuperAdminContext {
    /// SHA-256 fingerprint of the presented token, for audit logs.
    pub token_fingerprint: String,
}

// ============================================================================
// SECTION: Header Parsing
// ============================================================================

/// Extracts the bearer token from an `Authorization` header value.
#[must_use]
pub fn parse_bearer_token(auth_header: Option<&str>) -> Option<String> {
    let header = auth_header?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return None;
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Reads the bearer token from request headers.
fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    parse_bearer_token(header)
}

/// Compares two secrets in constant time.
#[must_use]
pub fn secrets_match(presented: &str, configured: &str) -> bool {
    if presented.len() != configured.len() {
        return false;
    }
    presented.as_bytes().ct_eq(configured.as_bytes()).into()
}

// ============================================================================
// SECTION: Authenticators
// ============================================================================

/// Authenticates a tenant request against configured principals.
///
/// # Errors
///
/// Returns 401 when the token is absent, unknown, or carries an unknown
/// role label.
pub fn authenticate(settings: &AuthSettings, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let token = bearer_from_headers(headers).ok_or_else(|| {
        ApiError::message(StatusCode::UNAUTHORIZED, "Missing authorization header")
    })?;
    for principal in &settings.principals {
        if secrets_match(&token, &principal.token) {
            let role = Role::parse(&principal.role).ok_or_else(|| {
                ApiError::message(StatusCode::UNAUTHORIZED, "Invalid or expired token")
            })?;
            return Ok(AuthContext {
                org_id: OrgId::new(principal.org_id.clone()),
                user_id: UserId::new(principal.user_id.clone()),
                role,
                company_id: principal.company_id.clone().map(CompanyId::new),
            });
        }
    }
    Err(ApiError::message(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
}

/// Authenticates a super-admin request against the operator token list.
///
/// # Errors
///
/// Returns 401 when the token is absent or unknown.
pub fn authenticate_super_admin(
    settings: &AuthSettings,
    headers: &HeaderMap,
) -> Result<SuperAdminContext, ApiError> {
    let token = bearer_from_headers(headers).ok_or_else(|| {
        ApiError::message(StatusCode::UNAUTHORIZED, "Missing authorization header")
    })?;
    for configured in &settings.super_admin_tokens {
        if secrets_match(&token, configured) {
            return Ok(SuperAdminContext {
                token_fingerprint: sha256_hex(token.as_bytes()),
            });
        }
    }
    Err(ApiError::message(StatusCode::UNAUTHORIZED, "Invalid or expired super-admin token"))
}

/// Verifies the shared scheduler secret header.
///
/// # Errors
///
/// Returns 503 when no secret is configured and 401 when the presented
/// value does not match.
pub fn verify_scheduler_secret(
    configured: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let Some(configured) = configured else {
        return Err(ApiError::message(
            StatusCode::SERVICE_UNAVAILABLE,
            "internal scheduler secret is not configured",
        ));
    };
    let presented = headers
        .get("x-internal-scheduler-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || !secrets_match(presented, configured) {
        return Err(ApiError::message(StatusCode::UNAUTHORIZED, "invalid scheduler secret"));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
