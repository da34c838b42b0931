//! SOCKS5 address handling
//!
//! [`TargetAddr`] covers the three address forms RFC 1928 allows on the
//! wire (IPv4, IPv6, domain name). The checker uses it in two directions:
//! encoding the probe destination into the UDP request header, and decoding
//! the bound address out of server replies.

use crate::socks::consts::*;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Destination or bound address in a SOCKS5 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Create a new TargetAddr from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: String, port: u16) -> Self {
        TargetAddr::Domain(domain, port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Whether this is the unspecified address (`0.0.0.0` or `::`)
    ///
    /// Proxies answer UDP ASSOCIATE with an unspecified bound address to
    /// mean "send relay datagrams to the address you connected to".
    pub fn is_unspecified(&self) -> bool {
        match self {
            TargetAddr::Ip(addr) => addr.ip().is_unspecified(),
            TargetAddr::Domain(_, _) => false,
        }
    }

    /// Serialize as ATYP + ADDR + PORT, the trailer shared by SOCKS5
    /// requests, replies, and UDP headers
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        match self {
            TargetAddr::Ip(SocketAddr::V4(addr)) => {
                bytes.push(SOCKS5_ADDR_TYPE_IPV4);
                bytes.extend_from_slice(&addr.ip().octets());
                bytes.extend_from_slice(&addr.port().to_be_bytes());
            }
            TargetAddr::Ip(SocketAddr::V6(addr)) => {
                bytes.push(SOCKS5_ADDR_TYPE_IPV6);
                bytes.extend_from_slice(&addr.ip().octets());
                bytes.extend_from_slice(&addr.port().to_be_bytes());
            }
            TargetAddr::Domain(domain, port) => {
                bytes.push(SOCKS5_ADDR_TYPE_DOMAIN);
                bytes.push(domain.len() as u8);
                bytes.extend_from_slice(domain.as_bytes());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
        }

        bytes
    }

    /// Read an ATYP + ADDR + PORT trailer from a stream
    ///
    /// Used for the bound address in the UDP ASSOCIATE reply. The ATYP byte
    /// must already have been consumed by the caller and is passed in.
    pub async fn read_from<S>(atyp: u8, stream: &mut S) -> Result<Self>
    where
        S: AsyncRead + Unpin,
    {
        match atyp {
            SOCKS5_ADDR_TYPE_IPV4 => {
                let mut buf = [0u8; 6];
                stream.read_exact(&mut buf).await?;
                let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
                let port = u16::from_be_bytes([buf[4], buf[5]]);
                Ok(TargetAddr::ipv4(ip, port))
            }

            SOCKS5_ADDR_TYPE_DOMAIN => {
                let mut len = [0u8; 1];
                stream.read_exact(&mut len).await?;
                let mut domain = vec![0u8; len[0] as usize];
                stream.read_exact(&mut domain).await?;
                let domain =
                    String::from_utf8(domain).with_context(|| "Invalid UTF-8 in domain")?;
                let mut port = [0u8; 2];
                stream.read_exact(&mut port).await?;
                Ok(TargetAddr::domain(domain, u16::from_be_bytes(port)))
            }

            SOCKS5_ADDR_TYPE_IPV6 => {
                let mut buf = [0u8; 18];
                stream.read_exact(&mut buf).await?;
                let mut ip_bytes = [0u8; 16];
                ip_bytes.copy_from_slice(&buf[..16]);
                let port = u16::from_be_bytes([buf[16], buf[17]]);
                Ok(TargetAddr::ipv6(Ipv6Addr::from(ip_bytes), port))
            }

            other => bail!("Unknown address type: {}", other),
        }
    }

    /// Resolve the address to a SocketAddr
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this performs DNS resolution.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        match self {
            TargetAddr::Ip(addr) => Ok(*addr),
            TargetAddr::Domain(domain, port) => {
                let addr_str = format!("{}:{}", domain, port);
                let resolved = tokio::net::lookup_host(&addr_str)
                    .await
                    .with_context(|| format!("Failed to resolve domain: {}", domain))?
                    .next()
                    .with_context(|| format!("No addresses found for domain: {}", domain))?;
                Ok(resolved)
            }
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}
