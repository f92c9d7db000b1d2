//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Territory;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Outbound HTTP settings shared by all fetchers
    #[serde(default)]
    pub http: HttpConfig,

    /// Harvest loop behavior
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Buffered log sink settings
    #[serde(default)]
    pub sink: SinkConfig,

    /// Remote feeds to harvest
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,

    /// Territory definitions with their criteria
    #[serde(default)]
    pub territories: Vec<Territory>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(AppError::validation("http timeouts must be > 0"));
        }
        if self.harvest.store_concurrency == 0 {
            return Err(AppError::validation(
                "harvest.store_concurrency must be > 0",
            ));
        }
        if self.sink.workers == 0 {
            return Err(AppError::validation("sink.workers must be > 0"));
        }
        if self.sink.buffer_capacity == 0 {
            return Err(AppError::validation("sink.buffer_capacity must be > 0"));
        }
        if self.sink.queue_depth == 0 {
            return Err(AppError::validation("sink.queue_depth must be > 0"));
        }

        let mut network_names = HashSet::new();
        for network in &self.networks {
            if network.name.trim().is_empty() {
                return Err(AppError::validation("network with empty name"));
            }
            if !network_names.insert(network.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate network '{}'",
                    network.name
                )));
            }
            url::Url::parse(&network.endpoint).map_err(|e| {
                AppError::validation(format!(
                    "network '{}' has invalid endpoint '{}': {e}",
                    network.name, network.endpoint
                ))
            })?;
        }

        if self.territories.is_empty() {
            return Err(AppError::validation("No territories defined"));
        }
        let mut territory_names = HashSet::new();
        for territory in &self.territories {
            if territory.name.trim().is_empty() {
                return Err(AppError::validation("territory with empty name"));
            }
            if !territory_names.insert(territory.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate territory '{}'",
                    territory.name
                )));
            }
            if territory.criteria().is_empty() {
                return Err(AppError::validation(format!(
                    "territory '{}' has no keywords, accounts or tags",
                    territory.name
                )));
            }
            for network in &territory.networks {
                if !network_names.contains(network.as_str()) {
                    return Err(AppError::validation(format!(
                        "territory '{}' references unknown network '{}'",
                        territory.name, network
                    )));
                }
            }
        }
        Ok(())
    }

    /// Limits that apply to a territory, falling back to the harvest defaults.
    pub fn limits_for(&self, territory: &Territory) -> Limits {
        territory.limits.unwrap_or(self.harvest.limits)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            harvest: HarvestConfig::default(),
            sink: SinkConfig::default(),
            networks: Vec::new(),
            territories: Vec::new(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// TCP connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Idle pooled connections are dropped after this many seconds
    #[serde(default = "defaults::pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            connect_timeout_secs: defaults::connect_timeout(),
            timeout_secs: defaults::timeout(),
            pool_idle_timeout_secs: defaults::pool_idle_timeout(),
        }
    }
}

/// Per-territory pagination limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum pages per criterion per run (0 means the default of 10)
    #[serde(default)]
    pub max_pages: u32,

    /// Page size requested from the remote feed
    #[serde(default = "defaults::results_per_page")]
    pub results_per_page: u32,
}

impl Limits {
    pub const DEFAULT_MAX_PAGES: u32 = 10;

    /// Page cap with the zero/unset fallback applied.
    pub fn effective_max_pages(&self) -> u32 {
        if self.max_pages == 0 {
            Self::DEFAULT_MAX_PAGES
        } else {
            self.max_pages
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_pages: Self::DEFAULT_MAX_PAGES,
            results_per_page: defaults::results_per_page(),
        }
    }
}

/// Harvest loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Maximum in-flight store writes per batch
    #[serde(default = "defaults::store_concurrency")]
    pub store_concurrency: usize,

    /// Pause between consecutive pages of one criterion
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Limits used by territories that do not set their own
    #[serde(default)]
    pub limits: Limits,
}

impl HarvestConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            store_concurrency: defaults::store_concurrency(),
            page_delay_ms: defaults::page_delay(),
            limits: Limits::default(),
        }
    }
}

/// Buffered log sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Write segment logs at all
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Root directory; each series gets a subdirectory
    #[serde(default = "defaults::sink_root")]
    pub root_dir: PathBuf,

    /// Workers per series
    #[serde(default = "defaults::sink_workers")]
    pub workers: usize,

    /// Per-worker buffer size in bytes
    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,

    /// Per-worker intake queue depth
    #[serde(default = "defaults::queue_depth")]
    pub queue_depth: usize,

    /// How long a submit may wait on a full queue before dropping
    #[serde(default = "defaults::enqueue_timeout")]
    pub enqueue_timeout_ms: u64,
}

impl SinkConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            root_dir: defaults::sink_root(),
            workers: defaults::sink_workers(),
            buffer_capacity: defaults::buffer_capacity(),
            queue_depth: defaults::queue_depth(),
            enqueue_timeout_ms: defaults::enqueue_timeout(),
        }
    }
}

/// A remote feed reachable through the generic JSON fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network identifier (e.g. "twitter"); part of every identity and cursor key
    pub name: String,

    /// Base URL of the paginated JSON endpoint
    pub endpoint: String,

    /// Environment variable holding a bearer token
    #[serde(default)]
    pub auth_token_env: Option<String>,

    /// Continuation value this network uses to say "no more pages"
    #[serde(default)]
    pub exhausted_sentinel: Option<String>,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
}

mod defaults {
    use std::path::PathBuf;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; feedharvest/0.1)".into()
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn pool_idle_timeout() -> u64 {
        90
    }

    // Harvest defaults
    pub fn results_per_page() -> u32 {
        100
    }
    pub fn store_concurrency() -> usize {
        16
    }
    pub fn page_delay() -> u64 {
        100
    }

    // Sink defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn sink_root() -> PathBuf {
        PathBuf::from("logs")
    }
    pub fn sink_workers() -> usize {
        4
    }
    pub fn buffer_capacity() -> usize {
        64 * 1024
    }
    pub fn queue_depth() -> usize {
        1024
    }
    pub fn enqueue_timeout() -> u64 {
        50
    }
}
