// crates/outreach-gate-core/src/provider_error.rs
// ============================================================================
// Module: Provider Error Envelope
// Description: Classification and external shape for provider failures.
// Purpose: Give operators one consistent error surface across all vendors.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every provider adapter raises [`ProviderError`]. The envelope classifies a
//! failure as transient (connectivity, 429, 5xx), terminal (bad credentials,
//! missing endpoint, malformed response, contract violation), or unknown, and
//! maps it to the external HTTP surface: transient becomes 503 with
//! `retryable=true`, everything else becomes 502 with `retryable=false`. The
//! body shape `{type, provider, operation, category, retryable, message}` is
//! part of the operator contract and must not drift per route.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Error Category
// ============================================================================

/// Classification of a provider failure.
///
/// # Invariants
/// - Variants are stable labels for metrics and the external error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connectivity failure or retryable HTTP status (429, 500, 502-504).
    Transient,
    /// Invalid credentials, missing endpoint, or contract violation.
    Terminal,
    /// Unclassified failure; treated as non-retryable.
    Unknown,
}

impl ErrorCategory {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Terminal => "terminal",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// SECTION: Provider Error
// ============================================================================

/// Typed failure raised by every provider adapter call.
///
/// # Invariants
/// - `category` is assigned at construction and never re-derived from the
///   message text downstream.
/// - `message` avoids embedding credentials; adapters truncate raw response
///   bodies before attaching them.
#[derive(Debug, Clone, Error)]
#[error("{provider} {operation} failed ({}): {message}", category.as_str())]
pub struct ProviderError {
    /// Provider slug the failure originated from.
    pub provider: String,
    /// Adapter operation that failed (stable label, not a method name).
    pub operation: String,
    /// Failure classification.
    pub category: ErrorCategory,
    /// Opaque human-readable detail.
    pub message: String,
}

impl ProviderError {
    /// Creates a transient provider error.
    #[must_use]
    pub fn transient(
        provider: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            category: ErrorCategory::Transient,
            message: message.into(),
        }
    }

    /// Creates a terminal provider error.
    #[must_use]
    pub fn terminal(
        provider: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            category: ErrorCategory::Terminal,
            message: message.into(),
        }
    }

    /// Creates an unclassified provider error.
    #[must_use]
    pub fn unknown(
        provider: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            category: ErrorCategory::Unknown,
            message: message.into(),
        }
    }

    /// Classifies an HTTP status code observed from a provider.
    #[must_use]
    pub const fn category_for_status(status: u16) -> ErrorCategory {
        match status {
            429 | 500 | 502..=504 => ErrorCategory::Transient,
            401 | 403 | 404 => ErrorCategory::Terminal,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Returns true when the caller may safely retry the operation.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self.category, ErrorCategory::Transient)
    }

    /// Returns the external HTTP status for this failure.
    ///
    /// Transient maps to 503; terminal and unknown map to 502.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.category {
            ErrorCategory::Transient => 503,
            ErrorCategory::Terminal | ErrorCategory::Unknown => 502,
        }
    }

    /// Builds the external error body for HTTP responses.
    #[must_use]
    pub fn detail(&self) -> Value {
        json!({
            "type": "provider_error",
            "provider": self.provider,
            "operation": self.operation,
            "category": self.category.as_str(),
            "retryable": self.retryable(),
            "message": self.message,
        })
    }
}

#[cfg(test)]
mod tests;
