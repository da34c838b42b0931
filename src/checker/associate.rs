//! UDP ASSOCIATE negotiation
//!
//! Sends the ASSOCIATE request on the established control connection and
//! turns the server's reply into the UDP relay endpoint for the probe.

use crate::error::CheckError;
use crate::socks::addr::TargetAddr;
use crate::socks::consts::*;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Request UDP relay capability and parse the bound address
///
/// The request claims `0.0.0.0:0` as the client's UDP endpoint; the checker
/// does not pre-bind a port before asking. A non-zero reply code is
/// surfaced verbatim as [`CheckError::AssociateFailed`].
pub async fn request_udp_associate<S>(stream: &mut S) -> Result<TargetAddr, CheckError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = [
        SOCKS5_VERSION,
        SOCKS5_CMD_UDP_ASSOCIATE,
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0, // 0.0.0.0
        0,
        0, // port 0
    ];

    stream
        .write_all(&request)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to send ASSOCIATE request: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| CheckError::Connection(e.to_string()))?;

    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to read ASSOCIATE reply: {}", e)))?;

    let [version, reply, _rsv, atyp] = header;

    if version != SOCKS5_VERSION {
        return Err(CheckError::Protocol(format!(
            "unexpected SOCKS version in ASSOCIATE reply: {}",
            version
        )));
    }

    if reply != SOCKS5_REPLY_SUCCEEDED {
        return Err(CheckError::AssociateFailed { code: reply });
    }

    let bound = TargetAddr::read_from(atyp, stream)
        .await
        .map_err(|e| CheckError::Protocol(format!("malformed bound address: {}", e)))?;

    debug!("server bound relay at {}", bound);
    Ok(bound)
}

/// Turn the reply's bound address into the concrete relay endpoint
///
/// An unspecified bound IP means "relay via the address you already
/// connected to" and is substituted with the TCP peer's IP. Domain-form
/// bound addresses are resolved.
pub async fn resolve_relay_endpoint(
    bound: TargetAddr,
    peer_ip: IpAddr,
) -> Result<SocketAddr, CheckError> {
    if bound.is_unspecified() {
        let port = bound.port();
        debug!("unspecified bound address, substituting TCP peer {}", peer_ip);
        return Ok(SocketAddr::new(peer_ip, port));
    }

    bound
        .resolve()
        .await
        .map_err(|e| CheckError::Connection(format!("cannot resolve relay endpoint: {}", e)))
}
