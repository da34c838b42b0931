//! # Udpcheck - SOCKS5 UDP Support Checker
//!
//! Udpcheck verifies that a SOCKS5 proxy actually supports the UDP
//! ASSOCIATE command from RFC 1928. It performs the full negotiation over
//! TCP (greeting, optional username/password authentication, UDP
//! ASSOCIATE), then sends a real DNS query through the UDP relay endpoint
//! the proxy hands back and waits for the answer. A proxy only passes when
//! a datagram makes the complete round trip, which is much stronger
//! evidence than TCP reachability.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use udpcheck::checker::{check_udp_support, CheckRequest};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let request = CheckRequest::new("proxy.example.com", 1080)
//!         .with_timeout(Duration::from_secs(5));
//!
//!     let result = check_udp_support(&request).await;
//!     std::process::exit(if result.is_success() { 0 } else { 1 });
//! }
//! ```
//!
//! ## Architecture
//!
//! Each check is one strictly sequential session:
//!
//! ```text
//! Connecting -> Authenticating -> Associating -> TestingUdp -> verdict
//! ```
//!
//! Every step's output feeds the next (the negotiated method, then the
//! relay address), and the first failure ends the check. Expected failures
//! (auth rejection, timeouts, protocol garbage) are ordinary outcomes
//! carried in the returned [`checker::CheckResult`], never panics.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod batch;
pub mod checker;
pub mod config;
pub mod dns;
pub mod error;
pub mod report;
pub mod socks;

// Re-export commonly used items
pub use checker::{check_udp_support, CheckRequest, CheckResult};
pub use config::{load_config, FileConfig};
pub use error::CheckError;

/// Version of the udpcheck library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "udpcheck");
    }
}
