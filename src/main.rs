//! Udpcheck - SOCKS5 UDP Support Checker
//!
//! This is the main entry point for the udpcheck command-line tool.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use udpcheck::batch::{parse_proxy_list, run_batch, DEFAULT_CONCURRENCY};
use udpcheck::checker::{check_udp_support, CheckRequest};
use udpcheck::config::{load_config, FileConfig};
use udpcheck::report;

/// Udpcheck - test whether a SOCKS5 proxy supports UDP ASSOCIATE
#[derive(Parser, Debug)]
#[command(name = "udpcheck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Proxy hostname or IP address
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    host: Option<String>,

    /// Proxy port
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    port: Option<u16>,

    /// Username for authentication
    #[arg(short, long)]
    username: Option<String>,

    /// Password for authentication
    #[arg(short, long)]
    password: Option<String>,

    /// Per-step timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Quiet mode (no output, use exit code)
    #[arg(short, long)]
    quiet: bool,

    /// Proxy list file for batch mode (host:port per line)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Checks in flight at once in batch mode
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// DNS resolver the probe query is addressed to
    #[arg(long)]
    resolver: Option<SocketAddr>,

    /// Name the probe query looks up
    #[arg(long)]
    probe_domain: Option<String>,

    /// Path to configuration file with defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level)?;

    let defaults = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let exit_code = match &args.file {
        Some(path) => run_batch_mode(&args, &defaults, path).await?,
        None => run_single_mode(&args, &defaults).await?,
    };

    std::process::exit(exit_code);
}

/// Merge CLI arguments over config-file defaults into a request
fn build_request(args: &Args, defaults: &FileConfig, host: String, port: u16) -> CheckRequest {
    let timeout = args.timeout.unwrap_or(defaults.check.timeout);
    let resolver = args.resolver.unwrap_or(defaults.check.resolver);
    let probe_domain = args
        .probe_domain
        .clone()
        .unwrap_or_else(|| defaults.check.probe_domain.clone());
    let username = args.username.clone().or_else(|| defaults.auth.username.clone());
    let password = args.password.clone().or_else(|| defaults.auth.password.clone());

    let mut request = CheckRequest::new(host, port)
        .with_timeout(Duration::from_secs(timeout))
        .with_resolver(resolver)
        .with_probe_domain(probe_domain);
    request.username = username;
    request.password = password;
    request
}

/// Check one proxy; returns the process exit code
async fn run_single_mode(args: &Args, defaults: &FileConfig) -> Result<i32> {
    let (host, port) = match (&args.host, args.port) {
        (Some(host), Some(port)) => (host.clone(), port),
        _ => bail!("host and port are required"), // unreachable, clap enforces
    };

    let request = build_request(args, defaults, host, port);

    if !args.quiet {
        println!("{}", report::render_header(&request.host, request.port));
    }

    let result = check_udp_support(&request).await;

    if !args.quiet {
        println!("{}\n", report::render_result(&result));
    }

    Ok(if result.is_success() { 0 } else { 1 })
}

/// Check every proxy in the list file; returns the process exit code
async fn run_batch_mode(args: &Args, defaults: &FileConfig, path: &PathBuf) -> Result<i32> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read proxy list: {:?}", path))?;
    let entries = parse_proxy_list(&content)
        .with_context(|| format!("Failed to parse proxy list: {:?}", path))?;

    if entries.is_empty() {
        bail!("proxy list {:?} contains no entries", path);
    }

    info!("checking {} proxies from {:?}", entries.len(), path);

    let requests = entries
        .into_iter()
        .map(|entry| build_request(args, defaults, entry.host, entry.port))
        .collect();

    let batch = run_batch(requests, args.concurrency).await?;

    if !args.quiet {
        for (entry, result) in &batch.results {
            println!("{}", report::render_batch_line(&entry.to_string(), result));
        }
        println!("{}", report::render_batch_summary(batch.passed(), batch.total()));
    }

    Ok(if batch.all_passed() { 0 } else { 1 })
}

/// Setup logging based on configuration
fn setup_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
