//! Error types for udpcheck
//!
//! This module defines the terminal failure taxonomy for a check. Every
//! variant is an ordinary outcome carried inside a
//! [`CheckResult`](crate::checker::CheckResult); none of them propagates as
//! a panic or an uncaught error from the checker entry point.

use std::fmt;
use thiserror::Error;

/// Terminal failure classification for a single check
///
/// There are no automatic retries inside a check: the first error aborts
/// the remaining steps and becomes the check's outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// TCP connect/read/write failure, including DNS resolution of the
    /// target host and per-step deadline expiry during the TCP phase
    #[error("Connection error: {0}")]
    Connection(String),

    /// Server selected 0xFF (no acceptable authentication methods), or
    /// demanded username/password when none was supplied
    #[error("No acceptable authentication methods")]
    AuthRejected,

    /// Username/password sub-negotiation returned a non-zero status
    #[error("Authentication failed")]
    AuthFailed,

    /// Malformed or unexpected bytes at any protocol step
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Non-zero UDP ASSOCIATE reply code, preserved for diagnostics
    #[error("UDP ASSOCIATE failed: {}", associate_reason(.code))]
    AssociateFailed {
        /// The SOCKS5 reply code sent by the server
        code: u8,
    },

    /// No UDP response within the timeout: the expected signal for a proxy
    /// without UDP relay enabled, not a crash
    #[error("No UDP response within timeout")]
    UdpTimeout,

    /// A UDP response arrived but did not validate as the expected DNS
    /// answer, which means the relay responds yet misbehaves
    #[error("UDP response failed validation: {0}")]
    UdpValidationFailed(String),

    /// Invalid check parameters, reported before any network I/O
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckError {
    /// Whether this failure is the benign "UDP not supported" signal
    pub fn is_udp_timeout(&self) -> bool {
        matches!(self, CheckError::UdpTimeout)
    }
}

/// Reply codes for the SOCKS5 UDP ASSOCIATE response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
    /// UDP not supported (common server extension, not in RFC 1928)
    UdpNotSupported = 0x09,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            0x09 => Ok(Socks5ReplyCode::UdpNotSupported),
            other => Err(other),
        }
    }
}

impl fmt::Display for Socks5ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Socks5ReplyCode::Succeeded => "Succeeded",
            Socks5ReplyCode::GeneralFailure => "General server failure",
            Socks5ReplyCode::ConnectionNotAllowed => "Connection not allowed by ruleset",
            Socks5ReplyCode::NetworkUnreachable => "Network unreachable",
            Socks5ReplyCode::HostUnreachable => "Host unreachable",
            Socks5ReplyCode::ConnectionRefused => "Connection refused",
            Socks5ReplyCode::TtlExpired => "TTL expired",
            Socks5ReplyCode::CommandNotSupported => "Command not supported",
            Socks5ReplyCode::AddressTypeNotSupported => "Address type not supported",
            Socks5ReplyCode::UdpNotSupported => "UDP not supported",
        })
    }
}

fn associate_reason(code: &u8) -> String {
    reply_code_message(*code)
}

/// Human-readable message for a raw ASSOCIATE reply code
pub fn reply_code_message(code: u8) -> String {
    match Socks5ReplyCode::try_from(code) {
        Ok(known) => known.to_string(),
        Err(other) => format!("Unknown error (code {})", other),
    }
}
