//! ---
//! dts_section: "01-core-functionality"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Shared primitives for the telemetry feed runtime."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_voltage_nominal() -> f64 {
    220.0
}

fn default_voltage_spread() -> f64 {
    20.0
}

fn default_voltage_capacity() -> usize {
    20
}

fn default_seed_spacing() -> Duration {
    Duration::from_secs(5)
}

fn default_current_seed() -> Vec<f64> {
    vec![45.0, 78.0, 52.0, 68.0, 85.0, 72.0]
}

fn default_current_min() -> u32 {
    20
}

fn default_current_max() -> u32 {
    119
}

fn default_temperature_initial() -> f64 {
    65.0
}

fn default_temperature_low() -> f64 {
    45.0
}

fn default_temperature_high() -> f64 {
    85.0
}

fn default_temperature_step() -> f64 {
    5.0
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(2_000)
}

fn default_temperature_interval() -> Duration {
    Duration::from_millis(5_000)
}

fn default_alert_ttl() -> Duration {
    Duration::from_millis(10_000)
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_url() -> String {
    "ws://localhost:3000/socket".to_owned()
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(3_000)
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(5_000)
}

fn default_server_enabled() -> bool {
    true
}

fn default_server_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_session_path() -> PathBuf {
    PathBuf::from("target/session/local_storage.json")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the telemetry feed daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "DTS_CONFIG";

    /// Load configuration from disk, respecting the `DTS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// Unlike an explicit `DTS_CONFIG` path, missing candidates are not an
    /// error: every section carries defaults, so the built-in configuration is
    /// returned with `source: None`.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using defaults"
        );
        let config = Self::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.feed.validate()?;
        self.push.validate()?;
        self.api.validate()?;
        if self.server.broadcast_capacity == 0 {
            return Err(anyhow!("server.broadcast_capacity must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Tunables for the feed controller and its timers.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub voltage: VoltageConfig,
    #[serde(default)]
    pub current: CurrentConfig,
    #[serde(default)]
    pub temperature: TemperatureConfig,
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(default = "default_temperature_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub temperature_interval: Duration,
    #[serde(default = "default_alert_ttl")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub alert_ttl: Duration,
    /// Fixed seed for reproducible synthetic data. Entropy-seeded when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            voltage: VoltageConfig::default(),
            current: CurrentConfig::default(),
            temperature: TemperatureConfig::default(),
            tick_interval: default_tick_interval(),
            temperature_interval: default_temperature_interval(),
            alert_ttl: default_alert_ttl(),
            random_seed: None,
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        self.voltage.validate()?;
        self.current.validate()?;
        self.temperature.validate()?;
        if self.tick_interval.is_zero() || self.temperature_interval.is_zero() {
            return Err(anyhow!("feed tick intervals must be greater than zero"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageConfig {
    #[serde(default = "default_voltage_nominal")]
    pub nominal: f64,
    #[serde(default = "default_voltage_spread")]
    pub spread: f64,
    #[serde(default = "default_voltage_capacity")]
    pub capacity: usize,
    #[serde(default = "default_seed_spacing")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub seed_spacing: Duration,
}

impl Default for VoltageConfig {
    fn default() -> Self {
        Self {
            nominal: default_voltage_nominal(),
            spread: default_voltage_spread(),
            capacity: default_voltage_capacity(),
            seed_spacing: default_seed_spacing(),
        }
    }
}

impl VoltageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(anyhow!("feed.voltage.capacity must be greater than zero"));
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(anyhow!("feed.voltage.spread must be a non-negative number"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConfig {
    #[serde(default = "default_current_seed")]
    pub seed: Vec<f64>,
    #[serde(default = "default_current_min")]
    pub min: u32,
    #[serde(default = "default_current_max")]
    pub max: u32,
}

impl Default for CurrentConfig {
    fn default() -> Self {
        Self {
            seed: default_current_seed(),
            min: default_current_min(),
            max: default_current_max(),
        }
    }
}

impl CurrentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.seed.is_empty() {
            return Err(anyhow!("feed.current.seed must declare at least one slot"));
        }
        if self.min > self.max {
            return Err(anyhow!(
                "feed.current.min ({}) exceeds feed.current.max ({})",
                self.min,
                self.max
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureConfig {
    #[serde(default = "default_temperature_initial")]
    pub initial: f64,
    #[serde(default = "default_temperature_low")]
    pub low: f64,
    #[serde(default = "default_temperature_high")]
    pub high: f64,
    #[serde(default = "default_temperature_step")]
    pub max_step: f64,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            initial: default_temperature_initial(),
            low: default_temperature_low(),
            high: default_temperature_high(),
            max_step: default_temperature_step(),
        }
    }
}

impl TemperatureConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.low < self.high) {
            return Err(anyhow!(
                "feed.temperature.low ({}) must be below feed.temperature.high ({})",
                self.low,
                self.high
            ));
        }
        if !(self.low..=self.high).contains(&self.initial) {
            return Err(anyhow!(
                "feed.temperature.initial ({}) lies outside [{}, {}]",
                self.initial,
                self.low,
                self.high
            ));
        }
        if !self.max_step.is_finite() || self.max_step < 0.0 {
            return Err(anyhow!("feed.temperature.max_step must be a non-negative number"));
        }
        Ok(())
    }
}

/// Real-time push channel settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,
    #[serde(default = "default_push_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            url: default_push_url(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.url)
            .with_context(|| format!("push.url '{}' is not a valid url", self.url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(anyhow!("push.url must use ws:// or wss://, got {}", url.scheme()));
        }
        Ok(())
    }
}

/// Backend HTTP API the dashboard consumes.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .with_context(|| format!("api.base_url '{}' is not a valid url", self.base_url))?;
        Ok(())
    }
}

/// Locally served API and render surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_server_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            listen: default_server_listen(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
