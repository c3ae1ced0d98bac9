//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Poll interval used when none (or an unusable one) is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest interval accepted before falling back to [`DEFAULT_INTERVAL`]
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Zone name (e.g., "example.com")
    pub zone: String,

    /// Record subdomain inside the zone; empty for the zone apex
    #[serde(default)]
    pub record: String,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a configuration for `record` inside `zone`
    pub fn new(provider: ProviderConfig, zone: impl Into<String>, record: impl Into<String>) -> Self {
        Self {
            provider,
            zone: zone.into(),
            record: record.into(),
            engine: EngineConfig::default(),
        }
    }

    /// Fully qualified record name
    pub fn record_name(&self) -> String {
        let zone = self.zone.trim_end_matches('.');
        let record = self.record.trim_matches('.');
        if record.is_empty() {
            zone.to_string()
        } else {
            format!("{}.{}", record, zone)
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("Zone name must be set"));
        }

        self.provider.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// API token, or the global API key when `email` is set
        api_token: String,
        /// Account email for legacy key authentication
        #[serde(default)]
        email: Option<String>,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, email } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if email.as_deref().is_some_and(|e| !e.contains('@')) {
                    return Err(crate::Error::config("Cloudflare email is not an address"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

// Credentials never reach logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Cloudflare { email, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("email", email)
                .finish(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between consensus rounds (in milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Build from an interval
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    /// Poll interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval() < MIN_INTERVAL {
            return Err(crate::Error::config("Poll interval must be at least one second"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Resolve the configured poll interval
///
/// Empty input yields the default silently; unparseable input yields the
/// default with a warning; anything shorter than a second yields the default.
pub fn parse_interval(raw: &str) -> Duration {
    let raw = raw.trim();
    if raw.is_empty() {
        return DEFAULT_INTERVAL;
    }

    match parse_duration(raw) {
        Ok(interval) if interval >= MIN_INTERVAL => interval,
        Ok(interval) => {
            tracing::warn!(
                "INTERVAL {:?} is below one second, using {:?}",
                interval,
                DEFAULT_INTERVAL
            );
            DEFAULT_INTERVAL
        }
        Err(e) => {
            tracing::warn!("failed to parse INTERVAL {:?}, using {:?}: {}", raw, DEFAULT_INTERVAL, e);
            DEFAULT_INTERVAL
        }
    }
}

/// Parse a duration string such as `"90s"`, `"5m"`, `"1h30m"` or `"1.5h"`
///
/// Accepts a sequence of decimal numbers, each with an optional fraction
/// and a unit suffix (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare `"0"`
/// is zero.
pub fn parse_duration(input: &str) -> Result<Duration, crate::Error> {
    let invalid = || crate::Error::config(format!("invalid duration {:?}", input));

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(crate::Error::config(format!("negative duration {:?}", input)));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(crate::Error::config(format!("missing unit in duration {:?}", input))),
            _ => return Err(crate::Error::config(format!("unknown unit {:?} in duration {:?}", unit, input))),
        };

        total_nanos += value * scale;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_nanos(total_nanos as u64))
}
