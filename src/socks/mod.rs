//! SOCKS5 protocol support
//!
//! Client-side wire framing for the subset of RFC 1928 this tool needs:
//! protocol constants, target addresses, and the UDP encapsulation header.

pub mod addr;
pub mod consts;
pub mod packet;

pub use addr::TargetAddr;
pub use consts::*;
pub use packet::{encode_udp_packet, parse_udp_packet, UdpPacket};
