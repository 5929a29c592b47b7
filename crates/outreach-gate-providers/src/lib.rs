// crates/outreach-gate-providers/src/lib.rs
// ============================================================================
// Module: Outreach Gate Providers Library
// Description: Stateless HTTP adapters for the supported outreach vendors.
// Purpose: Expose one canonical call surface per provider capability.
// Dependencies: outreach-gate-core, reqwest, rand, serde_json, url
// ============================================================================

//! ## Overview
//! Each adapter is constructed from tenant credentials (`api_key`, optional
//! `instance_url`) and holds no other state; nothing here touches the local
//! database. All calls share one contract: candidate URLs are tried in a
//! fixed order accepting the first non-404, requests retry with jittered
//! exponential backoff on connectivity errors and retryable statuses, JSON
//! bodies are parsed with `{data: …}` envelopes unwrapped, and every failure
//! surfaces as a typed [`outreach_gate_core::ProviderError`].
//!
//! Security posture: provider responses are untrusted; bodies are truncated
//! before they are attached to error messages.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod emailbison;
pub mod heyreach;
pub mod http;
pub mod lob;
pub mod registry;
pub mod smartlead;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use emailbison::EmailBisonClient;
pub use heyreach::HeyReachClient;
pub use lob::IdempotencyMaterial;
pub use lob::LobClient;
pub use registry::SUPPORTED_PROVIDER_SLUGS;
pub use registry::capability_for_slug;
pub use registry::is_supported_provider;
pub use smartlead::SmartleadClient;

#[cfg(test)]
mod tests;
