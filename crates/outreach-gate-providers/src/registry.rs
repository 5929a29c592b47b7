// crates/outreach-gate-providers/src/registry.rs
// ============================================================================
// Module: Provider Registry
// Description: Static mapping from provider slugs to capabilities.
// Purpose: Decide routing and validation for provider-scoped endpoints.
// Dependencies: outreach-gate-core
// ============================================================================

//! ## Overview
//! Each provider fulfils exactly one capability. The registry is a fixed
//! table: adding a provider means adding a slug here plus an adapter module,
//! never runtime introspection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outreach_gate_core::Capability;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Provider slugs the gateway routes for, in registration order.
pub const SUPPORTED_PROVIDER_SLUGS: &[&str] = &["smartlead", "heyreach", "emailbison", "lob"];

/// Returns the capability a provider slug fulfils.
#[must_use]
pub fn capability_for_slug(slug: &str) -> Option<Capability> {
    match slug {
        "smartlead" | "emailbison" => Some(Capability::EmailOutreach),
        "heyreach" => Some(Capability::LinkedinOutreach),
        "lob" => Some(Capability::DirectMail),
        _ => None,
    }
}

/// Returns true when the slug names a routed provider.
#[must_use]
pub fn is_supported_provider(slug: &str) -> bool {
    SUPPORTED_PROVIDER_SLUGS.contains(&slug)
}
