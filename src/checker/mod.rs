//! SOCKS5 UDP support checker
//!
//! The core check: one strictly sequential session that performs the TCP
//! handshake, authentication, UDP ASSOCIATE, and a real UDP round trip,
//! then classifies the result. Each phase feeds the next; the first
//! failure aborts the remainder.

mod associate;
mod handshake;
mod udp;

pub use associate::{request_udp_associate, resolve_relay_endpoint};
pub use handshake::{authenticate, negotiate_method, NegotiatedAuth};
pub use udp::probe_relay;

use crate::dns;
use crate::error::CheckError;
use crate::socks::consts::MAX_CREDENTIAL_LEN;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Default per-step timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default DNS resolver the probe query is addressed to
pub const DEFAULT_RESOLVER: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53);

/// Immutable input for one check
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Proxy hostname or IP address
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Username for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Per-step timeout
    pub timeout: Duration,
    /// DNS resolver the probe datagram is addressed to
    pub resolver: SocketAddr,
    /// Name looked up by the probe query
    pub probe_domain: String,
}

impl CheckRequest {
    /// Create a request with default timeout and probe settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        CheckRequest {
            host: host.into(),
            port,
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            resolver: DEFAULT_RESOLVER,
            probe_domain: dns::DEFAULT_PROBE_DOMAIN.to_string(),
        }
    }

    /// Set username and password
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the per-step timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the resolver the probe query is addressed to
    pub fn with_resolver(mut self, resolver: SocketAddr) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set the name the probe query looks up
    pub fn with_probe_domain(mut self, domain: impl Into<String>) -> Self {
        self.probe_domain = domain.into();
        self
    }

    /// Whether both credentials are present
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate the request before any network I/O
    pub fn validate(&self) -> Result<(), CheckError> {
        if self.username.is_some() != self.password.is_some() {
            return Err(CheckError::Config(
                "username and password must be supplied together".to_string(),
            ));
        }

        for (field, value) in [("username", &self.username), ("password", &self.password)] {
            if let Some(value) = value {
                if value.is_empty() || value.len() > MAX_CREDENTIAL_LEN {
                    return Err(CheckError::Config(format!(
                        "{} must encode to 1..=255 bytes, got {}",
                        field,
                        value.len()
                    )));
                }
            }
        }

        if self.probe_domain.is_empty() {
            return Err(CheckError::Config("probe domain must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Phase of the check state machine
///
/// Transitions are strictly forward; a failure in any phase carries that
/// phase's classification into the terminal `Failed` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    /// Resolving and connecting to the proxy over TCP
    Connecting,
    /// Greeting and authentication negotiation
    Authenticating,
    /// UDP ASSOCIATE request and reply
    Associating,
    /// Sending the probe datagram through the relay
    TestingUdp,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckPhase::Connecting => write!(f, "connecting"),
            CheckPhase::Authenticating => write!(f, "authenticating"),
            CheckPhase::Associating => write!(f, "associating"),
            CheckPhase::TestingUdp => write!(f, "testing udp"),
        }
    }
}

/// Terminal output of one check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// `Ok(())` on success, the classified failure otherwise
    pub outcome: Result<(), CheckError>,
    /// Human-readable step descriptions up to the failure point
    pub steps: Vec<String>,
    /// Wall-clock duration of the whole check
    pub elapsed: Duration,
}

impl CheckResult {
    /// Whether the proxy passed the UDP relay test
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&CheckError> {
        self.outcome.as_ref().err()
    }
}

/// Check whether a SOCKS5 proxy supports UDP ASSOCIATE end to end
///
/// Runs the full sequence: TCP connect, method negotiation (plus RFC 1929
/// sub-negotiation when the server selects username/password), UDP
/// ASSOCIATE, and one DNS query through the relay.
///
/// Timeout policy: `request.timeout` applies independently to each
/// blocking exchange (connect, greeting, authentication, ASSOCIATE, UDP
/// round trip), so the worst case is about five timeouts rather than one.
///
/// The session owns exactly one TCP connection and, during the probe, one
/// UDP socket; both are dropped before this function returns, on every
/// exit path. Expected failures never escape as panics or errors: the
/// classification always travels inside the returned [`CheckResult`].
pub async fn check_udp_support(request: &CheckRequest) -> CheckResult {
    let started = Instant::now();
    let mut steps = Vec::new();

    let outcome = run_check(request, &mut steps).await;
    let elapsed = started.elapsed();

    match &outcome {
        Ok(()) => info!(
            host = %request.host,
            port = request.port,
            ?elapsed,
            "UDP fully supported"
        ),
        Err(err) if err.is_udp_timeout() => {
            info!(host = %request.host, port = request.port, "UDP not supported (relay silent)")
        }
        Err(err) => info!(host = %request.host, port = request.port, %err, "check failed"),
    }

    CheckResult { outcome, steps, elapsed }
}

async fn run_check(request: &CheckRequest, steps: &mut Vec<String>) -> Result<(), CheckError> {
    request.validate()?;

    // Connecting
    let mut stream = connect(request).await?;
    let peer_ip = stream
        .peer_addr()
        .map_err(|e| CheckError::Connection(e.to_string()))?
        .ip();
    steps.push("[1/4] TCP connection established".to_string());

    // Authenticating
    let auth = step_timeout(
        request.timeout,
        CheckPhase::Authenticating,
        negotiate_method(&mut stream, request.has_credentials()),
    )
    .await?;

    if auth == NegotiatedAuth::UsernamePassword {
        // validate() guarantees both are present when offered
        let (username, password) = match (&request.username, &request.password) {
            (Some(u), Some(p)) => (u.as_str(), p.as_str()),
            _ => return Err(CheckError::AuthRejected),
        };
        step_timeout(
            request.timeout,
            CheckPhase::Authenticating,
            authenticate(&mut stream, username, password),
        )
        .await?;
    }

    let auth_note = match auth {
        NegotiatedAuth::NoAuth => "no auth required",
        NegotiatedAuth::UsernamePassword => "with credentials",
    };
    steps.push(format!("[2/4] SOCKS5 handshake complete ({})", auth_note));

    // Associating
    let bound = step_timeout(
        request.timeout,
        CheckPhase::Associating,
        request_udp_associate(&mut stream),
    )
    .await?;
    let relay = resolve_relay_endpoint(bound, peer_ip).await?;
    steps.push(format!("[3/4] UDP relay established: {}", relay));

    // TestingUdp. The control connection must stay open through the probe:
    // the relay session is tied to its lifetime.
    let probe = probe_relay(relay, request.resolver, &request.probe_domain, request.timeout).await;

    match &probe {
        Ok(()) => steps.push("[4/4] UDP traffic test: SUCCESS".to_string()),
        Err(_) => steps.push("[4/4] UDP traffic test: FAILED".to_string()),
    }

    drop(stream);
    probe
}

/// TCP connect with the per-step deadline applied
async fn connect(request: &CheckRequest) -> Result<TcpStream, CheckError> {
    let target = (request.host.as_str(), request.port);

    debug!("connecting to {}:{}", request.host, request.port);
    match tokio::time::timeout(request.timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(CheckError::Connection(format!(
            "cannot connect to {}:{}: {}",
            request.host, request.port, e
        ))),
        Err(_) => Err(CheckError::Connection(format!(
            "timed out {} to {}:{}",
            CheckPhase::Connecting,
            request.host,
            request.port
        ))),
    }
}

/// Apply the per-step deadline to one protocol exchange
async fn step_timeout<T>(
    timeout: Duration,
    phase: CheckPhase,
    fut: impl std::future::Future<Output = Result<T, CheckError>>,
) -> Result<T, CheckError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CheckError::Connection(format!("timed out while {}", phase))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CheckRequest::new("proxy.example.com", 1080);
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert_eq!(request.resolver, DEFAULT_RESOLVER);
        assert_eq!(request.probe_domain, dns::DEFAULT_PROBE_DOMAIN);
        assert!(!request.has_credentials());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_builder() {
        let request = CheckRequest::new("10.0.0.1", 9050)
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(2))
            .with_probe_domain("example.org");

        assert!(request.has_credentials());
        assert_eq!(request.timeout, Duration::from_secs(2));
        assert_eq!(request.probe_domain, "example.org");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_lone_credential() {
        let mut request = CheckRequest::new("h", 1080);
        request.username = Some("user".to_string());

        assert!(matches!(request.validate(), Err(CheckError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_credentials() {
        let request = CheckRequest::new("h", 1080).with_credentials("x".repeat(256), "pass");
        assert!(matches!(request.validate(), Err(CheckError::Config(_))));

        let request = CheckRequest::new("h", 1080).with_credentials("user", "y".repeat(300));
        assert!(matches!(request.validate(), Err(CheckError::Config(_))));
    }

    #[test]
    fn test_validate_accepts_255_byte_credentials() {
        let request =
            CheckRequest::new("h", 1080).with_credentials("x".repeat(255), "y".repeat(255));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_probe_domain() {
        let request = CheckRequest::new("h", 1080).with_probe_domain("");
        assert!(matches!(request.validate(), Err(CheckError::Config(_))));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(format!("{}", CheckPhase::Connecting), "connecting");
        assert_eq!(format!("{}", CheckPhase::TestingUdp), "testing udp");
    }

    #[tokio::test]
    async fn test_config_error_before_any_io() {
        // host that would hang if dialed; validation must fail first
        let request = CheckRequest::new("192.0.2.1", 1080)
            .with_credentials("x".repeat(300), "pass")
            .with_timeout(Duration::from_secs(30));

        let started = Instant::now();
        let result = check_udp_support(&request).await;

        assert!(matches!(result.error(), Some(CheckError::Config(_))));
        assert!(result.steps.is_empty());
        // no connection attempt was made, so no timeout was consumed
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_connect_refused_classified() {
        // bind a listener, take its port, drop it so connects are refused
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = CheckRequest::new(addr.ip().to_string(), addr.port())
            .with_timeout(Duration::from_secs(2));
        let result = check_udp_support(&request).await;

        assert!(matches!(result.error(), Some(CheckError::Connection(_))));
        assert!(result.steps.is_empty());
    }
}
