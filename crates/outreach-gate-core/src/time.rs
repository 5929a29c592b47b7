// crates/outreach-gate-core/src/time.rs
// ============================================================================
// Module: Outreach Gate Time Helpers
// Description: RFC 3339 timestamp helpers for persisted records and logs.
// Purpose: Keep every stored timestamp in one canonical textual form.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Every persisted timestamp in Outreach Gate is an RFC 3339 string in UTC.
//! These helpers are the only place wall-clock time is read; domain code
//! receives timestamps as explicit values so tests stay deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current UTC time as an RFC 3339 string.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Parses an RFC 3339 timestamp, tolerating a trailing `Z` suffix.
///
/// Returns `None` for empty or unparseable input; callers treat missing
/// timestamps as absent rather than failing the surrounding operation.
#[must_use]
pub fn parse_rfc3339(value: &str) -> Option<OffsetDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    OffsetDateTime::parse(trimmed, &Rfc3339).ok()
}

/// Parses a webhook signature timestamp: unix seconds or RFC 3339.
#[must_use]
pub fn parse_signature_timestamp(value: &str) -> Option<OffsetDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let seconds = trimmed.parse::<i64>().ok()?;
        return OffsetDateTime::from_unix_timestamp(seconds).ok();
    }
    parse_rfc3339(trimmed)
}
