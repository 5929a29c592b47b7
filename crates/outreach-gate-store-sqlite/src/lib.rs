// crates/outreach-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Outreach Gate SQLite Store Library
// Description: Durable storage for webhook events and tenant domain tables.
// Purpose: Guard idempotency and tenancy invariants at the storage boundary.
// Dependencies: outreach-gate-core, rusqlite, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! The store owns the only cross-request synchronization primitive the
//! projection engine relies on: the UNIQUE constraint over
//! `(provider_slug, event_key)` in `webhook_events`. Every tenant-scoped
//! query takes an `org_id` predicate alongside its row predicate; there is no
//! unscoped read path. Timestamps are supplied by callers as RFC 3339
//! strings so store behavior stays deterministic under test.
//!
//! Security posture: database contents are untrusted on read; JSON columns
//! that fail to parse surface typed errors instead of panicking.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::CampaignDiff;
pub use store::EventFilter;
pub use store::EventUpdate;
pub use store::GatewayStoreConfig;
pub use store::GatewayStoreError;
pub use store::LeadUpsert;
pub use store::MessageUpsert;
pub use store::NewCampaign;
pub use store::NewEntitlement;
pub use store::NewEvent;
pub use store::NewPiece;
pub use store::PieceUpdate;
pub use store::SqliteGatewayStore;
