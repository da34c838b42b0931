//! Handshake and authentication negotiation
//!
//! Client side of the RFC 1928 greeting and, when the server asks for it,
//! the RFC 1929 username/password sub-negotiation. Both functions are
//! generic over the stream so protocol units run on in-memory duplex pipes.

use crate::error::CheckError;
use crate::socks::consts::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Authentication method agreed with the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatedAuth {
    /// Server selected 0x00, no further negotiation
    NoAuth,
    /// Server selected 0x02, username/password sub-negotiation required
    UsernamePassword,
}

/// Send the method greeting and read the server's selection
///
/// The client always offers no-auth; username/password is offered
/// additionally only when `offer_password` is set. Selection of a method
/// the client did not offer is a protocol violation.
pub async fn negotiate_method<S>(
    stream: &mut S,
    offer_password: bool,
) -> Result<NegotiatedAuth, CheckError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting: &[u8] = if offer_password {
        &[
            SOCKS5_VERSION,
            2,
            SOCKS5_AUTH_METHOD_NONE,
            SOCKS5_AUTH_METHOD_PASSWORD,
        ]
    } else {
        &[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    };

    stream
        .write_all(greeting)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to send greeting: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| CheckError::Connection(e.to_string()))?;

    let mut reply = [0u8; 2];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to read method selection: {}", e)))?;

    if reply[0] != SOCKS5_VERSION {
        return Err(CheckError::Protocol(format!(
            "unexpected SOCKS version in method selection: {}",
            reply[0]
        )));
    }

    match reply[1] {
        SOCKS5_AUTH_METHOD_NONE => {
            debug!("server selected no-auth");
            Ok(NegotiatedAuth::NoAuth)
        }
        SOCKS5_AUTH_METHOD_PASSWORD if offer_password => {
            debug!("server selected username/password");
            Ok(NegotiatedAuth::UsernamePassword)
        }
        SOCKS5_AUTH_METHOD_PASSWORD => {
            // server demands credentials we do not have
            Err(CheckError::AuthRejected)
        }
        SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => Err(CheckError::AuthRejected),
        other => Err(CheckError::Protocol(format!(
            "server selected unknown auth method: 0x{:02x}",
            other
        ))),
    }
}

/// Run the RFC 1929 username/password sub-negotiation
///
/// # Protocol
///
/// Client sends:
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
///
/// Server responds with a version byte and a status byte; non-zero status
/// means the credentials were refused.
pub async fn authenticate<S>(
    stream: &mut S,
    username: &str,
    password: &str,
) -> Result<(), CheckError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Length limits are enforced by CheckRequest::validate before any
    // socket exists; this guards direct library callers.
    if username.len() > MAX_CREDENTIAL_LEN || password.len() > MAX_CREDENTIAL_LEN {
        return Err(CheckError::Config(
            "username and password must each encode to at most 255 bytes".to_string(),
        ));
    }

    let mut request = Vec::with_capacity(3 + username.len() + password.len());
    request.push(SOCKS5_AUTH_VERSION);
    request.push(username.len() as u8);
    request.extend_from_slice(username.as_bytes());
    request.push(password.len() as u8);
    request.extend_from_slice(password.as_bytes());

    stream
        .write_all(&request)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to send credentials: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| CheckError::Connection(e.to_string()))?;

    let mut reply = [0u8; 2];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(|e| CheckError::Connection(format!("failed to read auth status: {}", e)))?;

    if reply[1] != 0x00 {
        debug!("authentication refused with status 0x{:02x}", reply[1]);
        return Err(CheckError::AuthFailed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn server_script(
        responses: Vec<Vec<u8>>,
        mut stream: impl AsyncRead + AsyncWrite + Unpin,
    ) -> Vec<u8> {
        let mut received = Vec::new();
        let mut buf = [0u8; 512];
        for response in responses {
            let n = stream.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
            stream.write_all(&response).await.unwrap();
        }
        received
    }

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let (mut client, server) = duplex(1024);
        let script = tokio::spawn(server_script(
            vec![vec![SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE]],
            server,
        ));

        let method = negotiate_method(&mut client, false).await.unwrap();
        assert_eq!(method, NegotiatedAuth::NoAuth);

        // greeting offered exactly one method
        let sent = script.await.unwrap();
        assert_eq!(sent, vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]);
    }

    #[tokio::test]
    async fn test_negotiate_offers_password_with_credentials() {
        let (mut client, server) = duplex(1024);
        let script = tokio::spawn(server_script(
            vec![vec![SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD]],
            server,
        ));

        let method = negotiate_method(&mut client, true).await.unwrap();
        assert_eq!(method, NegotiatedAuth::UsernamePassword);

        let sent = script.await.unwrap();
        assert_eq!(
            sent,
            vec![
                SOCKS5_VERSION,
                2,
                SOCKS5_AUTH_METHOD_NONE,
                SOCKS5_AUTH_METHOD_PASSWORD
            ]
        );
    }

    #[tokio::test]
    async fn test_negotiate_rejected() {
        let (mut client, server) = duplex(1024);
        tokio::spawn(server_script(
            vec![vec![SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE]],
            server,
        ));

        let result = negotiate_method(&mut client, false).await;
        assert_eq!(result, Err(CheckError::AuthRejected));
    }

    #[tokio::test]
    async fn test_negotiate_password_without_credentials_is_rejection() {
        let (mut client, server) = duplex(1024);
        tokio::spawn(server_script(
            vec![vec![SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD]],
            server,
        ));

        let result = negotiate_method(&mut client, false).await;
        assert_eq!(result, Err(CheckError::AuthRejected));
    }

    #[tokio::test]
    async fn test_negotiate_bad_version() {
        let (mut client, server) = duplex(1024);
        tokio::spawn(server_script(
            vec![vec![0x04, SOCKS5_AUTH_METHOD_NONE]],
            server,
        ));

        let result = negotiate_method(&mut client, false).await;
        assert!(matches!(result, Err(CheckError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_negotiate_unknown_method() {
        let (mut client, server) = duplex(1024);
        tokio::spawn(server_script(vec![vec![SOCKS5_VERSION, 0x55]], server));

        let result = negotiate_method(&mut client, false).await;
        assert!(matches!(result, Err(CheckError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_negotiate_short_read() {
        let (mut client, server) = duplex(1024);
        drop(server); // connection reset before any reply

        let result = negotiate_method(&mut client, false).await;
        assert!(matches!(result, Err(CheckError::Connection(_))));
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (mut client, server) = duplex(1024);
        let script = tokio::spawn(server_script(
            vec![vec![SOCKS5_AUTH_VERSION, 0x00]],
            server,
        ));

        authenticate(&mut client, "user", "pass").await.unwrap();

        let sent = script.await.unwrap();
        assert_eq!(sent[0], SOCKS5_AUTH_VERSION);
        assert_eq!(sent[1], 4);
        assert_eq!(&sent[2..6], b"user");
        assert_eq!(sent[6], 4);
        assert_eq!(&sent[7..11], b"pass");
    }

    #[tokio::test]
    async fn test_authenticate_refused() {
        let (mut client, server) = duplex(1024);
        tokio::spawn(server_script(
            vec![vec![SOCKS5_AUTH_VERSION, 0x01]],
            server,
        ));

        let result = authenticate(&mut client, "user", "wrong").await;
        assert_eq!(result, Err(CheckError::AuthFailed));
    }

    #[tokio::test]
    async fn test_authenticate_oversized_credentials() {
        let (mut client, _server) = duplex(1024);
        let long = "x".repeat(256);

        let result = authenticate(&mut client, &long, "pass").await;
        assert!(matches!(result, Err(CheckError::Config(_))));
    }
}
