// # ddnsd - DDNS Daemon
//
// Thin integration layer: all DDNS logic lives in ddns-core.
//
// The ddnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the default voter set and the Cloudflare provider
// 4. Running the DDNS engine until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `CLOUDFLARE_TOKEN`: API token (or global API key with `CLOUDFLARE_EMAIL`)
// - `CLOUDFLARE_EMAIL`: Account email, selects key authentication (optional)
// - `CLOUDFLARE_ZONE`: Zone name, e.g. `example.com`
// - `RECORD`: Subdomain to manage; empty for the zone apex
// - `INTERVAL`: Poll interval, e.g. `30s`, `5m`, `1h` (default `5m`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
//
// ## Example
//
// ```bash
// export CLOUDFLARE_TOKEN=your_token
// export CLOUDFLARE_ZONE=example.com
// export RECORD=home
// export INTERVAL=2m
//
// ddnsd
// ```

use anyhow::{Context, Result};
use ddns_core::config::{DdnsConfig, EngineConfig, ProviderConfig, parse_interval};
use ddns_core::{ConsensusResolver, DdnsEngine, EngineEvent};
use ddns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the engine gets to stop after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    cloudflare_token: String,
    cloudflare_email: Option<String>,
    cloudflare_zone: String,
    record: String,
    interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            cloudflare_token: non_empty("CLOUDFLARE_TOKEN").context(
                "CLOUDFLARE_TOKEN is required. Set it via: export CLOUDFLARE_TOKEN=your_token",
            )?,
            cloudflare_email: non_empty("CLOUDFLARE_EMAIL"),
            cloudflare_zone: non_empty("CLOUDFLARE_ZONE").context(
                "CLOUDFLARE_ZONE is required. Set it via: export CLOUDFLARE_ZONE=example.com",
            )?,
            record: lookup("RECORD").unwrap_or_default().trim().to_string(),
            interval: parse_interval(&lookup("INTERVAL").unwrap_or_default()),
        })
    }

    /// Engine configuration derived from the environment
    fn ddns_config(&self) -> DdnsConfig {
        let mut config = DdnsConfig::new(
            ProviderConfig::Cloudflare {
                api_token: self.cloudflare_token.clone(),
                email: self.cloudflare_email.clone(),
            },
            self.cloudflare_zone.clone(),
            self.record.clone(),
        );
        config.engine = EngineConfig::with_interval(self.interval);
        config
    }
}

/// Parse `DDNS_LOG_LEVEL`
fn parse_log_level(raw: Option<&str>) -> Result<Level> {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("info") => Ok(Level::INFO),
        Some("trace") => Ok(Level::TRACE),
        Some("debug") => Ok(Level::DEBUG),
        Some("warn") => Ok(Level::WARN),
        Some("error") => Ok(Level::ERROR),
        Some(other) => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            other
        ),
    }
}

fn main() -> ExitCode {
    let log_level = match parse_log_level(env::var("DDNS_LOG_LEVEL").ok().as_deref()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.ddns_config().validate() {
        error!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Build the engine: voters, provider, zone lookup
///
/// Every failure here is a startup failure.
async fn build_engine(config: &Config) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let registry = ddns_ip_http::default_voters().context("failed to build voter registry")?;
    info!(
        "Registered {} voters (total weight {})",
        registry.len(),
        registry.total_weight()
    );
    let resolver = ConsensusResolver::new(Arc::new(registry));

    let mut provider = CloudflareProvider::new(
        config.cloudflare_token.clone(),
        config.cloudflare_email.clone(),
        None,
    )
    .context("failed to create Cloudflare client")?;

    let zone_id = provider
        .resolve_zone(&config.cloudflare_zone)
        .await
        .with_context(|| format!("failed to lookup zone {}", config.cloudflare_zone))?;
    info!("Using zone {} ({})", config.cloudflare_zone, zone_id);

    let engine = DdnsEngine::new(resolver, Box::new(provider), config.ddns_config())?;
    Ok(engine)
}

/// Run the daemon
async fn run_daemon(config: Config) -> DdnsExitCode {
    let (mut engine, mut events) = match build_engine(&config).await {
        Ok(built) => built,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    // Ends when the engine drops its sender
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Engine event");
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut engine_task =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    let finished = tokio::select! {
        result = &mut engine_task => Some(result),
        signal = wait_for_shutdown() => {
            match signal {
                Ok(name) => info!("Received shutdown signal: {}", name),
                Err(e) => error!("Signal handling error: {}", e),
            }
            None
        }
    };

    let result = match finished {
        Some(result) => result,
        None => {
            info!("Shutting down daemon");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_task).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
                    return DdnsExitCode::RuntimeError;
                }
            }
        }
    };

    match result {
        Ok(Ok(())) => DdnsExitCode::CleanShutdown,
        // The engine only returns errors from startup
        Ok(Err(e)) => {
            error!("Startup failed: {}", e);
            DdnsExitCode::ConfigError
        }
        Err(e) => {
            error!("Engine task failed: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
