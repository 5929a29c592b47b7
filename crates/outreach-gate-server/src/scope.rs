// crates/outreach-gate-server/src/scope.rs
// ============================================================================
// Module: Identity Scope Resolution
// Description: Effective company-scope decisions for tenant requests.
// Purpose: Enforce tenant isolation before any query is built.
// Dependencies: outreach-gate-core
// ============================================================================

//! ## Overview
//! Every tenant request resolves to an effective company scope before
//! touching the store. Company-scoped callers may only name their own
//! company (a mismatch is a 404, not a 403, so foreign rows never confirm
//! their existence). Org-level callers must be org admins and must name a
//! company unless the endpoint explicitly allows `all_companies=true`.
//! Combining `all_companies` with a `company_id` is always a 400.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::StatusCode;
use outreach_gate_core::CompanyId;

use crate::api::ApiError;
use crate::auth::AuthContext;
use crate::auth::Role;

// ============================================================================
// SECTION: Scope Type
// ============================================================================

/// Resolved company scope for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyScope {
    /// Scoped to one company.
    Company(CompanyId),
    /// Org-admin request spanning all companies.
    AllCompanies,
}

impl CompanyScope {
    /// Returns the company filter for store queries.
    #[must_use]
    pub const fn company_filter(&self) -> Option<&CompanyId> {
        match self {
            Self::Company(company_id) => Some(company_id),
            Self::AllCompanies => None,
        }
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves the effective company scope for a request.
///
/// `allow_all_companies` marks endpoints that accept `all_companies=true`
/// from org admins.
///
/// # Errors
///
/// Returns 400 for contradictory inputs, 403 for non-admin org-level
/// callers, and 404 for cross-company probes.
pub fn resolve_company_scope(
    auth: &AuthContext,
    requested_company: Option<&CompanyId>,
    all_companies: bool,
    allow_all_companies: bool,
) -> Result<CompanyScope, ApiError> {
    if all_companies && requested_company.is_some() {
        return Err(ApiError::bad_request(
            "all_companies cannot be combined with company_id",
        ));
    }
    if let Some(own_company) = &auth.company_id {
        if let Some(requested) = requested_company
            && requested != own_company
        {
            return Err(ApiError::not_found("Company not found"));
        }
        if all_companies {
            return Err(ApiError::bad_request(
                "all_companies requires org-level access",
            ));
        }
        return Ok(CompanyScope::Company(own_company.clone()));
    }
    if auth.role != Role::OrgAdmin {
        return Err(ApiError::message(
            StatusCode::FORBIDDEN,
            "org-level access requires org_admin role",
        ));
    }
    if all_companies {
        if allow_all_companies {
            return Ok(CompanyScope::AllCompanies);
        }
        return Err(ApiError::bad_request("all_companies is not supported here"));
    }
    requested_company.map_or_else(
        || Err(ApiError::bad_request("company_id is required")),
        |requested| Ok(CompanyScope::Company(requested.clone())),
    )
}

#[cfg(test)]
mod tests;
