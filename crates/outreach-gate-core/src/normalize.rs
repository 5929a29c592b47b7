// crates/outreach-gate-core/src/normalize.rs
// ============================================================================
// Module: Outreach Gate Normalization
// Description: Total maps from provider vocabularies onto canonical enums.
// Purpose: Collapse per-provider status and direction strings deterministically.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Providers disagree on campaign, lead, and message vocabulary. These
//! functions are total: any input, including `None`, empty strings, and
//! unknown words, maps to a canonical value with a deterministic default.
//! Matching is case- and whitespace-insensitive. The tables are fixed domain
//! knowledge; adding a provider means extending a table, never changing the
//! enum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Canonical Enums
// ============================================================================

/// Canonical campaign lifecycle status.
///
/// # Invariants
/// - Wire form is the SCREAMING_SNAKE label returned by [`Self::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// Campaign exists but has not started sending.
    Drafted,
    /// Campaign is actively sending.
    Active,
    /// Campaign is paused and may resume.
    Paused,
    /// Campaign was stopped, archived, or deleted upstream.
    Stopped,
    /// Campaign ran to completion.
    Completed,
}

impl CampaignStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drafted => "DRAFTED",
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Completed => "COMPLETED",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFTED" => Some(Self::Drafted),
            "ACTIVE" => Some(Self::Active),
            "PAUSED" => Some(Self::Paused),
            "STOPPED" => Some(Self::Stopped),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Canonical lead status within a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Lead is in an active sequence.
    Active,
    /// Lead sequence is paused.
    Paused,
    /// Lead opted out.
    Unsubscribed,
    /// Lead replied to outreach.
    Replied,
    /// Delivery to the lead bounced.
    Bounced,
    /// Lead is queued or unverified.
    Pending,
    /// Lead finished the sequence without replying.
    Contacted,
    /// Lead accepted a connection (LinkedIn outreach).
    Connected,
    /// Lead explicitly declined.
    NotInterested,
    /// Provider vocabulary did not map.
    Unknown,
}

impl LeadStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Unsubscribed => "unsubscribed",
            Self::Replied => "replied",
            Self::Bounced => "bounced",
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::Connected => "connected",
            Self::NotInterested => "not_interested",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "unsubscribed" => Some(Self::Unsubscribed),
            "replied" => Some(Self::Replied),
            "bounced" => Some(Self::Bounced),
            "pending" => Some(Self::Pending),
            "contacted" => Some(Self::Contacted),
            "connected" => Some(Self::Connected),
            "not_interested" => Some(Self::NotInterested),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Canonical message direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    /// Message received from the lead.
    Inbound,
    /// Message sent to the lead.
    Outbound,
    /// Direction could not be inferred.
    Unknown,
}

impl MessageDirection {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Canonical direct-mail piece status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceStatus {
    /// Piece accepted and queued by the producer.
    Queued,
    /// Piece is being rendered or imposed.
    Processing,
    /// Piece is printed and awaiting handoff.
    ReadyForMail,
    /// Piece is in the mail stream.
    InTransit,
    /// Piece was delivered.
    Delivered,
    /// Piece was returned to sender.
    Returned,
    /// Piece was canceled before mailing.
    Canceled,
    /// Piece production or delivery failed.
    Failed,
    /// Provider event did not map to a known state.
    Unknown,
}

impl PieceStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::ReadyForMail => "ready_for_mail",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Returned => "returned",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a stored wire label back into the enum.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "ready_for_mail" => Some(Self::ReadyForMail),
            "in_transit" => Some(Self::InTransit),
            "delivered" => Some(Self::Delivered),
            "returned" => Some(Self::Returned),
            "canceled" => Some(Self::Canceled),
            "failed" => Some(Self::Failed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Normalization Functions
// ============================================================================

/// Maps a provider campaign status onto the canonical enum.
///
/// Defaults to [`CampaignStatus::Drafted`] for absent or unknown input.
#[must_use]
pub fn normalize_campaign_status(value: Option<&str>) -> CampaignStatus {
    let Some(raw) = value else {
        return CampaignStatus::Drafted;
    };
    match raw.trim().to_ascii_uppercase().as_str() {
        "ACTIVE" | "START" | "STARTED" | "RUNNING" => CampaignStatus::Active,
        "PAUSED" | "PAUSE" => CampaignStatus::Paused,
        "STOPPED" | "STOP" | "ARCHIVED" | "DELETED" | "FAILED" | "PENDING DELETION" => {
            CampaignStatus::Stopped
        }
        "COMPLETED" | "DONE" => CampaignStatus::Completed,
        _ => CampaignStatus::Drafted,
    }
}

/// Maps a provider lead status onto the canonical enum.
///
/// Defaults to [`LeadStatus::Unknown`] for absent or unmapped input.
#[must_use]
pub fn normalize_lead_status(value: Option<&str>) -> LeadStatus {
    let Some(raw) = value else {
        return LeadStatus::Unknown;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" | "verified" | "in_sequence" => LeadStatus::Active,
        "paused" | "pause" | "sequence_stopped" => LeadStatus::Paused,
        "unsubscribed" | "unsubscribe" => LeadStatus::Unsubscribed,
        "replied" | "reply" => LeadStatus::Replied,
        "bounced" | "bounce" => LeadStatus::Bounced,
        "pending" | "verifying" | "unverified" | "unknown" | "risky" | "inactive"
        | "never_contacted" => LeadStatus::Pending,
        "sequence_finished" | "contacted" => LeadStatus::Contacted,
        "connected" => LeadStatus::Connected,
        "not_interested" | "not interested" => LeadStatus::NotInterested,
        _ => LeadStatus::Unknown,
    }
}

/// Maps a provider direction word onto the canonical enum.
///
/// Defaults to [`MessageDirection::Unknown`] for absent or unmapped input.
#[must_use]
pub fn normalize_message_direction(value: Option<&str>) -> MessageDirection {
    let Some(raw) = value else {
        return MessageDirection::Unknown;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "inbound" | "reply" | "replied" => MessageDirection::Inbound,
        "outbound" | "sent" => MessageDirection::Outbound,
        _ => MessageDirection::Unknown,
    }
}

/// Normalizes a direct-mail event type into the `piece.<event>` family.
///
/// Tolerates dotted prefixes (`postcard.delivered`) and dash variants.
/// Unknown input maps to `piece.unknown`.
#[must_use]
pub fn normalize_lob_event_type(value: Option<&str>) -> String {
    let Some(raw) = value else {
        return "piece.unknown".to_string();
    };
    let mut key = raw.trim().to_ascii_lowercase().replace('-', "_");
    if let Some((_, suffix)) = key.rsplit_once('.') {
        key = suffix.to_string();
    }
    let normalized = match key.as_str() {
        "created" => "piece.created",
        "updated" => "piece.updated",
        "processed" => "piece.processed",
        "in_transit" | "in_transit_local" => "piece.in_transit",
        "delivered" => "piece.delivered",
        "returned" => "piece.returned",
        "canceled" | "cancelled" => "piece.canceled",
        "re_routed" | "rerouted" => "piece.re-routed",
        "failed" => "piece.failed",
        _ => "piece.unknown",
    };
    normalized.to_string()
}

/// Maps a normalized `piece.<event>` type onto the piece status enum.
#[must_use]
pub fn piece_status_for_event(normalized_event_type: &str) -> PieceStatus {
    match normalized_event_type {
        "piece.created" => PieceStatus::Queued,
        "piece.updated" => PieceStatus::Processing,
        "piece.processed" => PieceStatus::ReadyForMail,
        "piece.in_transit" | "piece.re-routed" => PieceStatus::InTransit,
        "piece.delivered" => PieceStatus::Delivered,
        "piece.returned" => PieceStatus::Returned,
        "piece.canceled" => PieceStatus::Canceled,
        "piece.failed" => PieceStatus::Failed,
        _ => PieceStatus::Unknown,
    }
}

/// Returns true when a raw `status` field plausibly names a campaign status.
///
/// Used to disambiguate a bare `status` key shared between campaign and lead
/// payloads before normalization runs.
#[must_use]
pub fn looks_like_campaign_status(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_uppercase().as_str(),
        "DRAFTED"
            | "DRAFT"
            | "ACTIVE"
            | "START"
            | "STARTED"
            | "RUNNING"
            | "PAUSED"
            | "PAUSE"
            | "STOPPED"
            | "STOP"
            | "COMPLETED"
            | "DONE"
    )
}

/// Returns true when a raw `status` field plausibly names a lead status.
#[must_use]
pub fn looks_like_lead_status(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "active"
            | "paused"
            | "pause"
            | "unsubscribed"
            | "unsubscribe"
            | "replied"
            | "reply"
            | "bounced"
            | "bounce"
            | "pending"
            | "contacted"
            | "connected"
            | "not_interested"
            | "not interested"
    )
}

#[cfg(test)]
mod tests;
