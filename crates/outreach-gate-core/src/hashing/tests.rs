// crates/outreach-gate-core/src/hashing/tests.rs
// ============================================================================
// Module: Hashing Unit Tests
// Description: Unit tests for SHA-256 digests and hex encoding.
// Purpose: Pin digest wire forms against known vectors.
// Dependencies: outreach-gate-core
// ============================================================================

//! ## Overview
//! Pins the SHA-256 hex form against the well-known empty-input vector.

#![allow(clippy::panic, reason = "Test-only assertions.")]

use super::hex_encode;
use super::sha256_hex;

#[test]
fn sha256_empty_vector() {
    assert_eq!(
        sha256_hex(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn sha256_known_body() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn hex_encode_is_lowercase() {
    assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
}
