//! UDP relay probe
//!
//! Proves the relay forwards datagrams end to end: encapsulates one DNS
//! query for the relay, sends it, and validates the single response.

use crate::dns;
use crate::error::CheckError;
use crate::socks::consts::UDP_BUFFER_SIZE;
use crate::socks::packet::{encode_udp_packet, parse_udp_packet, UdpPacket};
use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// Send one DNS query through the relay and await the answer
///
/// The datagram goes to `relay`, wrapped in the RFC 1928 UDP header naming
/// `resolver` as the final destination. The socket lives only for this
/// probe and is released when the function returns, on every path.
///
/// No response within `timeout` is [`CheckError::UdpTimeout`], the clean
/// signal for a proxy without working UDP relay. A response that arrives
/// but does not strip and validate as a DNS answer is
/// [`CheckError::UdpValidationFailed`].
pub async fn probe_relay(
    relay: SocketAddr,
    resolver: SocketAddr,
    probe_domain: &str,
    timeout: Duration,
) -> Result<(), CheckError> {
    let bind_addr = if relay.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to bind UDP socket: {}", e)))?;

    let query = dns::build_query(probe_domain);
    let packet = UdpPacket::new(resolver.into(), Bytes::from(query));
    let datagram = encode_udp_packet(&packet);

    debug!("sending {} byte probe to relay {}", datagram.len(), relay);
    socket
        .send_to(&datagram, relay)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to send to relay: {}", e)))?;

    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    let (len, from) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
        .await
        .map_err(|_| CheckError::UdpTimeout)?
        .map_err(|e| CheckError::Connection(format!("failed to receive from relay: {}", e)))?;

    debug!("received {} byte response from {}", len, from);

    let response = parse_udp_packet(&buf[..len])
        .map_err(|e| CheckError::UdpValidationFailed(e.to_string()))?;

    if response.is_fragmented() {
        return Err(CheckError::UdpValidationFailed(format!(
            "unexpected fragment number {}",
            response.frag
        )));
    }

    dns::validate_response(&response.data)
        .map_err(|e| CheckError::UdpValidationFailed(e.to_string()))?;

    Ok(())
}
