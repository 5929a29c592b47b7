// crates/outreach-gate-core/src/normalize/tests.rs
// ============================================================================
// Module: Normalization Unit Tests
// Description: Unit and property tests for the normalization tables.
// Purpose: Pin canonical mappings and prove totality over arbitrary input.
// Dependencies: outreach-gate-core, proptest
// ============================================================================

//! ## Overview
//! Pins the provider vocabulary tables and uses property tests to prove the
//! normalizers are total over arbitrary strings.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use proptest::prelude::proptest;

use super::CampaignStatus;
use super::LeadStatus;
use super::MessageDirection;
use super::PieceStatus;
use super::looks_like_campaign_status;
use super::looks_like_lead_status;
use super::normalize_campaign_status;
use super::normalize_lead_status;
use super::normalize_lob_event_type;
use super::normalize_message_direction;
use super::piece_status_for_event;

#[test]
fn campaign_status_table() {
    assert_eq!(normalize_campaign_status(None), CampaignStatus::Drafted);
    assert_eq!(normalize_campaign_status(Some("")), CampaignStatus::Drafted);
    assert_eq!(normalize_campaign_status(Some("launching")), CampaignStatus::Drafted);
    assert_eq!(normalize_campaign_status(Some("queued")), CampaignStatus::Drafted);
    assert_eq!(normalize_campaign_status(Some("  running ")), CampaignStatus::Active);
    assert_eq!(normalize_campaign_status(Some("START")), CampaignStatus::Active);
    assert_eq!(normalize_campaign_status(Some("pause")), CampaignStatus::Paused);
    assert_eq!(normalize_campaign_status(Some("archived")), CampaignStatus::Stopped);
    assert_eq!(normalize_campaign_status(Some("pending deletion")), CampaignStatus::Stopped);
    assert_eq!(normalize_campaign_status(Some("done")), CampaignStatus::Completed);
    assert_eq!(normalize_campaign_status(Some("???")), CampaignStatus::Drafted);
}

#[test]
fn lead_status_table() {
    assert_eq!(normalize_lead_status(None), LeadStatus::Unknown);
    assert_eq!(normalize_lead_status(Some("verified")), LeadStatus::Active);
    assert_eq!(normalize_lead_status(Some("in_sequence")), LeadStatus::Active);
    assert_eq!(normalize_lead_status(Some("sequence_stopped")), LeadStatus::Paused);
    assert_eq!(normalize_lead_status(Some("sequence_finished")), LeadStatus::Contacted);
    assert_eq!(normalize_lead_status(Some("never_contacted")), LeadStatus::Pending);
    assert_eq!(normalize_lead_status(Some("risky")), LeadStatus::Pending);
    assert_eq!(normalize_lead_status(Some("not interested")), LeadStatus::NotInterested);
    assert_eq!(normalize_lead_status(Some("BOUNCE")), LeadStatus::Bounced);
    assert_eq!(normalize_lead_status(Some("gibberish")), LeadStatus::Unknown);
}

#[test]
fn message_direction_table() {
    assert_eq!(normalize_message_direction(None), MessageDirection::Unknown);
    assert_eq!(normalize_message_direction(Some("reply")), MessageDirection::Inbound);
    assert_eq!(normalize_message_direction(Some("Replied")), MessageDirection::Inbound);
    assert_eq!(normalize_message_direction(Some("sent")), MessageDirection::Outbound);
    assert_eq!(normalize_message_direction(Some("sideways")), MessageDirection::Unknown);
}

#[test]
fn lob_event_type_table() {
    assert_eq!(normalize_lob_event_type(None), "piece.unknown");
    assert_eq!(normalize_lob_event_type(Some("postcard.delivered")), "piece.delivered");
    assert_eq!(normalize_lob_event_type(Some("letter.in_transit_local")), "piece.in_transit");
    assert_eq!(normalize_lob_event_type(Some("re-routed")), "piece.re-routed");
    assert_eq!(normalize_lob_event_type(Some("CANCELLED")), "piece.canceled");
    assert_eq!(normalize_lob_event_type(Some("minted")), "piece.unknown");
}

#[test]
fn piece_status_table() {
    assert_eq!(piece_status_for_event("piece.created"), PieceStatus::Queued);
    assert_eq!(piece_status_for_event("piece.updated"), PieceStatus::Processing);
    assert_eq!(piece_status_for_event("piece.processed"), PieceStatus::ReadyForMail);
    assert_eq!(piece_status_for_event("piece.re-routed"), PieceStatus::InTransit);
    assert_eq!(piece_status_for_event("piece.unknown"), PieceStatus::Unknown);
    assert_eq!(piece_status_for_event("something else"), PieceStatus::Unknown);
}

#[test]
fn status_guards_disambiguate_shared_field() {
    assert!(looks_like_campaign_status("Running"));
    assert!(!looks_like_campaign_status("replied"));
    assert!(looks_like_lead_status("replied"));
    assert!(!looks_like_lead_status("RUNNING"));
}

proptest! {
    #[test]
    fn campaign_status_is_total(input in ".*") {
        let _ = normalize_campaign_status(Some(&input));
    }

    #[test]
    fn lead_status_is_total(input in ".*") {
        let _ = normalize_lead_status(Some(&input));
    }

    #[test]
    fn message_direction_is_total(input in ".*") {
        let _ = normalize_message_direction(Some(&input));
    }

    #[test]
    fn lob_event_type_is_total(input in ".*") {
        let normalized = normalize_lob_event_type(Some(&input));
        let _ = piece_status_for_event(&normalized);
    }
}
