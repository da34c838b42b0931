//! Batch driver
//!
//! Reads a proxy list (`host:port` per line), runs the core check against
//! each entry with bounded concurrency, and aggregates pass/fail counts.
//! Retries, if wanted, belong here at the batch level; the core check
//! never retries internally.

use crate::checker::{check_udp_support, CheckRequest, CheckResult};
use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Default number of checks in flight at once
pub const DEFAULT_CONCURRENCY: usize = 8;

/// One `host:port` entry from a proxy list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    /// Proxy hostname or IP address
    pub host: String,
    /// Proxy port
    pub port: u16,
}

impl FromStr for ProxyEntry {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // rsplit so IPv6 literals and odd hostnames keep their colons
        let (host, port) = s
            .rsplit_once(':')
            .with_context(|| format!("missing port in proxy entry: {:?}", s))?;

        if host.is_empty() {
            bail!("missing host in proxy entry: {:?}", s);
        }

        let port = port
            .parse::<u16>()
            .with_context(|| format!("invalid port in proxy entry: {:?}", s))?;

        Ok(ProxyEntry {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ProxyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse a proxy list: one `host:port` per line, blank lines and `#`
/// comments skipped
pub fn parse_proxy_list(content: &str) -> Result<Vec<ProxyEntry>> {
    let mut entries = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = line
            .parse::<ProxyEntry>()
            .with_context(|| format!("line {}", lineno + 1))?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Aggregated outcome of a batch run
#[derive(Debug)]
pub struct BatchReport {
    /// Per-proxy results, in input order
    pub results: Vec<(ProxyEntry, CheckResult)>,
}

impl BatchReport {
    /// Number of proxies that passed
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_success()).count()
    }

    /// Number of proxies checked
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Whether every proxy passed
    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }
}

/// Run one check per request with at most `concurrency` in flight
///
/// Each check owns its own sockets and shares nothing, so they are safe to
/// run concurrently. Results come back in input order.
pub async fn run_batch(requests: Vec<CheckRequest>, concurrency: usize) -> Result<BatchReport> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, request) in requests.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .context("batch semaphore closed")?;

            debug!("checking {}:{}", request.host, request.port);
            let result = check_udp_support(&request).await;
            let entry = ProxyEntry {
                host: request.host.clone(),
                port: request.port,
            };
            Ok::<_, anyhow::Error>((index, entry, result))
        });
    }

    let mut indexed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, entry, result) = joined.context("batch task panicked")??;
        indexed.push((index, entry, result));
    }

    indexed.sort_by_key(|(index, _, _)| *index);
    let results = indexed
        .into_iter()
        .map(|(_, entry, result)| (entry, result))
        .collect();

    Ok(BatchReport { results })
}
