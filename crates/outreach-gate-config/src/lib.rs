// crates/outreach-gate-config/src/lib.rs
// ============================================================================
// Module: Outreach Gate Config Library
// Description: Environment-driven settings for the gateway process.
// Purpose: Centralize env keys, defaults, and bounds clamping.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Gateway configuration is environment-driven: every knob in the external
//! contract maps to one env key. Numeric values are clamped into safe bounds
//! rather than rejected, and invalid mode strings fall back to the permissive
//! default, so a partially misconfigured deployment degrades instead of
//! refusing to boot. Only structurally required values (the database path for
//! the binary) produce hard errors.
//!
//! Settings are resolved through a lookup function so tests can inject
//! environment maps without mutating process state.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use settings::AuthSettings;
pub use settings::GatewaySettings;
pub use settings::LobSignatureMode;
pub use settings::MessageSyncMode;
pub use settings::ObservabilityExportSettings;
pub use settings::PrincipalSettings;
pub use settings::ReplayControls;
pub use settings::SettingsError;
pub use settings::SloThresholds;
