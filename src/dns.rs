//! Minimal DNS probe payload
//!
//! The UDP relay test needs a payload that a public resolver will answer,
//! so the checker sends one fixed A-record query and validates the reply
//! against it. Nothing here is a general DNS implementation; it is just
//! enough framing to tell a genuine answer from an unrelated datagram.

use anyhow::{bail, Result};

/// Transaction ID stamped on every probe query
///
/// Fixed on purpose: each check owns its UDP socket, so the ID only has to
/// match between the one query and the one reply.
pub const PROBE_TRANSACTION_ID: u16 = 0x1234;

/// Default name looked up by the probe
pub const DEFAULT_PROBE_DOMAIN: &str = "google.com";

/// QR bit in the third byte of a DNS header
const DNS_FLAG_RESPONSE: u8 = 0x80;

/// Build a recursive A-record query for `name`
///
/// Header: ID, RD flag set, one question, no other sections. The question
/// encodes `name` as length-prefixed labels with QTYPE=A, QCLASS=IN.
pub fn build_query(name: &str) -> Vec<u8> {
    let mut query = Vec::with_capacity(12 + name.len() + 6);

    query.extend_from_slice(&PROBE_TRANSACTION_ID.to_be_bytes()); // ID
    query.extend_from_slice(&0x0100u16.to_be_bytes()); // flags: RD
    query.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    query.extend_from_slice(&0u16.to_be_bytes()); // ANCOUNT
    query.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    query.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT

    for label in name.split('.') {
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0);
    query.extend_from_slice(&1u16.to_be_bytes()); // QTYPE=A
    query.extend_from_slice(&1u16.to_be_bytes()); // QCLASS=IN

    query
}

/// Validate that `payload` is a DNS response to the probe query
///
/// Checks the transaction ID and the QR bit. This is what separates a
/// relay that forwarded the query from one that echoed garbage back.
pub fn validate_response(payload: &[u8]) -> Result<()> {
    if payload.len() < 12 {
        bail!("response too short for a DNS header: {} bytes", payload.len());
    }

    let id = u16::from_be_bytes([payload[0], payload[1]]);
    if id != PROBE_TRANSACTION_ID {
        bail!(
            "transaction ID mismatch: expected 0x{:04x}, got 0x{:04x}",
            PROBE_TRANSACTION_ID,
            id
        );
    }

    if payload[2] & DNS_FLAG_RESPONSE == 0 {
        bail!("QR bit not set, payload is not a DNS response");
    }

    Ok(())
}

/// Build a syntactically valid DNS response to the probe query
///
/// Only used by tests and mock relays: same ID as the query, QR bit set,
/// question section copied back, zero answers.
pub fn build_mock_response(name: &str) -> Vec<u8> {
    let query = build_query(name);
    let mut response = query;
    response[2] |= DNS_FLAG_RESPONSE;
    response
}
