//! Configuration for udpcheck
//!
//! An optional TOML file supplies defaults for the knobs that rarely
//! change between invocations (timeout, resolver, probe domain,
//! credentials). Command-line flags always win over file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::checker::DEFAULT_RESOLVER;
use crate::dns::DEFAULT_PROBE_DOMAIN;

/// Default per-step timeout in seconds
fn default_timeout_secs() -> u64 {
    5
}

/// Default resolver for the probe query
fn default_resolver() -> SocketAddr {
    DEFAULT_RESOLVER
}

/// Default probe domain
fn default_probe_domain() -> String {
    DEFAULT_PROBE_DOMAIN.to_string()
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FileConfig {
    /// Check parameters
    #[serde(default)]
    pub check: CheckConfig,

    /// Proxy credentials
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Check parameter defaults
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckConfig {
    /// Per-step timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,

    /// Resolver the probe datagram is addressed to
    #[serde(default = "default_resolver")]
    pub resolver: SocketAddr,

    /// Name the probe query looks up
    #[serde(default = "default_probe_domain")]
    pub probe_domain: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout_secs(),
            resolver: default_resolver(),
            probe_domain: default_probe_domain(),
        }
    }
}

/// Proxy credentials
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Username for SOCKS5 auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for SOCKS5 auth
    #[serde(default)]
    pub password: Option<String>,
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}
