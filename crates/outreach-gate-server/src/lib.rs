// crates/outreach-gate-server/src/lib.rs
// ============================================================================
// Module: Outreach Gate Server Library
// Description: HTTP gateway: ingest, projection, replay, reconciliation.
// Purpose: Wire the trust, storage, and provider layers into one service.
// Dependencies: axum, tokio, outreach-gate-{core,config,providers,store-sqlite}
// ============================================================================

//! ## Overview
//! The server exposes webhook ingestion with per-provider trust models, the
//! operator surfaces for dead-letter inspection and replay, on-demand and
//! scheduled reconciliation, and the observability endpoints. Handlers are
//! async; store and provider work is blocking and bridged with
//! `tokio::task::block_in_place` so the multi-thread runtime absorbs it.
//!
//! Security posture: webhook bodies, headers, and query inputs are hostile
//! until the trust layer admits them; auth decisions fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod auth;
pub mod log;
pub mod metrics;
pub mod projection;
pub mod reconciliation;
pub mod replay;
pub mod scope;
pub mod server;
pub mod trust;
pub mod webhooks;
pub mod writes;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use log::LogSink;
pub use log::NoopLogSink;
pub use log::StderrLogSink;
pub use metrics::MetricsRegistry;
pub use server::GatewayServer;
pub use server::GatewayServerError;
pub use server::GatewayState;
