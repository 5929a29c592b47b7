// crates/outreach-gate-core/src/ids.rs
// ============================================================================
// Module: Outreach Gate Identifiers
// Description: Canonical opaque identifiers for tenant-scoped records.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout
//! Outreach Gate. Identifiers are opaque UTF-8 strings (UUID text in
//! practice) and serialize transparently on the wire. No validation or
//! normalization is applied by the types themselves; ownership checks happen
//! at the storage boundary where `org_id` predicates are mandatory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares a string-backed identifier newtype with the standard surface.
macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied
        ///   by this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_id!(
    /// Organization identifier. Owns every other tenant-scoped record.
    OrgId
);

string_id!(
    /// Company identifier scoped within an organization.
    CompanyId
);

string_id!(
    /// Provider identifier for a configured outreach vendor row.
    ProviderId
);

string_id!(
    /// Local campaign identifier.
    CampaignId
);

string_id!(
    /// Local campaign-lead identifier.
    LeadId
);

string_id!(
    /// Local campaign-message identifier.
    MessageId
);

string_id!(
    /// Local direct-mail piece identifier.
    PieceId
);

string_id!(
    /// Local inbox (sender account) identifier.
    InboxId
);

string_id!(
    /// Webhook event row identifier.
    EventId
);

string_id!(
    /// User identifier carried on authenticated requests.
    UserId
);
