//! Test utilities and mocks for udpcheck
//!
//! Provides a scripted SOCKS5 proxy with a loopback UDP relay, used across
//! the integration tests to exercise the full check flow without any real
//! proxy.

use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use udpcheck::dns;
use udpcheck::socks::{encode_udp_packet, parse_udp_packet, UdpPacket};

/// Authentication behavior of the mock proxy
#[derive(Debug, Clone)]
pub enum MockAuth {
    /// Select no-auth (0x00)
    NoAuth,
    /// Select username/password and verify against these values
    Password {
        /// Expected username
        username: String,
        /// Expected password
        password: String,
    },
    /// Select 0xFF (no acceptable methods)
    Reject,
}

/// Relay behavior once a probe datagram arrives
#[derive(Debug, Clone, Copy)]
pub enum RelayMode {
    /// Reply with a crafted valid DNS response
    Dns,
    /// Echo the query payload back unchanged (still a query, not an answer)
    Echo,
    /// Receive and never reply
    Silent,
    /// Reply with bytes that are not a relay datagram at all
    Garbage,
}

/// Mock proxy behavior knobs
#[derive(Debug, Clone)]
pub struct MockProxyConfig {
    /// Authentication script
    pub auth: MockAuth,
    /// ASSOCIATE reply code
    pub associate_reply: u8,
    /// Advertise `0.0.0.0` as the bound relay address instead of loopback
    pub advertise_unspecified: bool,
    /// Relay behavior
    pub relay: RelayMode,
}

impl Default for MockProxyConfig {
    fn default() -> Self {
        MockProxyConfig {
            auth: MockAuth::NoAuth,
            associate_reply: 0x00,
            advertise_unspecified: false,
            relay: RelayMode::Dns,
        }
    }
}

/// Running mock proxy endpoints
pub struct MockProxy {
    /// TCP control address to hand to the checker
    pub tcp_addr: SocketAddr,
    /// UDP relay address (also what the ASSOCIATE reply advertises)
    pub udp_addr: SocketAddr,
}

/// Start a mock SOCKS5 proxy on loopback
///
/// Accepts one control connection per spawned listener loop iteration and
/// keeps it open until the client hangs up, since the relay session is
/// tied to the control connection's lifetime.
pub async fn start_mock_proxy(config: MockProxyConfig) -> MockProxy {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tcp_addr = tcp.local_addr().unwrap();
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let udp_addr = udp.local_addr().unwrap();

    let relay_mode = config.relay;
    tokio::spawn(run_relay(udp, relay_mode));

    let control = config.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _peer)) = tcp.accept().await else {
                return;
            };
            let control = control.clone();
            tokio::spawn(handle_control(stream, control, udp_addr));
        }
    });

    MockProxy { tcp_addr, udp_addr }
}

async fn handle_control(mut stream: TcpStream, config: MockProxyConfig, udp_addr: SocketAddr) {
    // greeting: VER NMETHODS METHODS...
    let mut head = [0u8; 2];
    if stream.read_exact(&mut head).await.is_err() {
        return;
    }
    assert_eq!(head[0], 0x05, "client must speak SOCKS5");
    let mut methods = vec![0u8; head[1] as usize];
    if stream.read_exact(&mut methods).await.is_err() {
        return;
    }

    match &config.auth {
        MockAuth::Reject => {
            let _ = stream.write_all(&[0x05, 0xFF]).await;
            // hold the connection so the client sees the selection byte
            let mut buf = [0u8; 1];
            let _ = stream.read(&mut buf).await;
            return;
        }
        MockAuth::NoAuth => {
            let _ = stream.write_all(&[0x05, 0x00]).await;
        }
        MockAuth::Password { username, password } => {
            let _ = stream.write_all(&[0x05, 0x02]).await;

            let mut head = [0u8; 2];
            if stream.read_exact(&mut head).await.is_err() {
                return;
            }
            assert_eq!(head[0], 0x01, "RFC 1929 version");
            let mut uname = vec![0u8; head[1] as usize];
            if stream.read_exact(&mut uname).await.is_err() {
                return;
            }
            let mut plen = [0u8; 1];
            if stream.read_exact(&mut plen).await.is_err() {
                return;
            }
            let mut passwd = vec![0u8; plen[0] as usize];
            if stream.read_exact(&mut passwd).await.is_err() {
                return;
            }

            let ok = uname == username.as_bytes() && passwd == password.as_bytes();
            let status = if ok { 0x00 } else { 0x01 };
            let _ = stream.write_all(&[0x01, status]).await;
            if !ok {
                return;
            }
        }
    }

    // request: VER CMD RSV ATYP ADDR(4) PORT(2), client always sends IPv4
    let mut request = [0u8; 10];
    if stream.read_exact(&mut request).await.is_err() {
        return;
    }
    assert_eq!(request[0], 0x05);
    assert_eq!(request[1], 0x03, "only UDP ASSOCIATE is expected");

    let bound_ip = if config.advertise_unspecified {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::LOCALHOST
    };
    let mut reply = vec![0x05, config.associate_reply, 0x00, 0x01];
    reply.extend_from_slice(&bound_ip.octets());
    reply.extend_from_slice(&udp_addr.port().to_be_bytes());
    let _ = stream.write_all(&reply).await;

    // keep the control connection open until the client hangs up
    let mut buf = [0u8; 1];
    let _ = stream.read(&mut buf).await;
}

async fn run_relay(udp: UdpSocket, mode: RelayMode) {
    let mut buf = vec![0u8; 4096];
    loop {
        let Ok((len, from)) = udp.recv_from(&mut buf).await else {
            return;
        };
        let Ok(packet) = parse_udp_packet(&buf[..len]) else {
            continue;
        };

        let payload = match mode {
            RelayMode::Silent => continue,
            RelayMode::Garbage => {
                let _ = udp.send_to(b"definitely not socks", from).await;
                continue;
            }
            RelayMode::Echo => packet.data.to_vec(),
            RelayMode::Dns => dns::build_mock_response(dns::DEFAULT_PROBE_DOMAIN),
        };

        let reply = encode_udp_packet(&UdpPacket::new(packet.addr, payload.into()));
        let _ = udp.send_to(&reply, from).await;
    }
}
