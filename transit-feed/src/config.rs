//! Service configuration loaded from a TOML file.
//!
//! Each consumer (display instance) lists the station timetables and line
//! traffic it wants, with an independent refresh interval per category.
//! Display toggles are carried through for the presentation layer; the
//! fetch engine only reads the queries and intervals.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ConsumerId, TimetableQuery, TrafficQuery};
use crate::ratp::{DEFAULT_BASE_URL, RatpConfig};

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "transit-feed.toml";

/// Errors from loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the expected shape
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// The values are well-formed but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP adapter listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,
}

/// Upstream API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_concurrent: 8,
        }
    }
}

impl ApiSettings {
    pub fn client_config(&self) -> RatpConfig {
        RatpConfig::new()
            .with_base_url(&self.base_url)
            .with_timeout(self.timeout_secs)
            .with_max_concurrent(self.max_concurrent)
    }
}

/// One display instance and what it polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub identifier: ConsumerId,

    #[serde(default)]
    pub timetables: TimetablesConfig,

    #[serde(default)]
    pub traffic: TrafficConfig,
}

impl ConsumerConfig {
    pub fn new(identifier: impl Into<ConsumerId>) -> Self {
        Self {
            identifier: identifier.into(),
            timetables: TimetablesConfig::default(),
            traffic: TrafficConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetablesConfig {
    /// Seconds between timetable refreshes (default: one minute).
    pub update_interval_secs: u64,

    /// Number of next passes the display shows per station.
    pub next_passes_amount: usize,

    pub queries: Vec<TimetableQuery>,
}

impl Default for TimetablesConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 60,
            next_passes_amount: 2,
            queries: Vec::new(),
        }
    }
}

impl TimetablesConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Seconds between traffic refreshes (default: ten minutes).
    pub update_interval_secs: u64,

    /// Whether the display hides lines running normally.
    pub hide_when_normal: bool,

    pub queries: Vec<TrafficQuery>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 600,
            hide_when_normal: false,
            queries: Vec::new(),
        }
    }
}

impl TrafficConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            api: ApiSettings::default(),
            consumers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load and validate the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be non-zero".into()));
        }

        let mut seen = HashSet::new();
        for consumer in &self.consumers {
            let id = consumer.identifier.as_str();
            if id.trim().is_empty() {
                return Err(ConfigError::Invalid("consumer identifier is empty".into()));
            }
            if !seen.insert(id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate consumer identifier: {id}"
                )));
            }
            if consumer.timetables.update_interval_secs == 0
                || consumer.traffic.update_interval_secs == 0
            {
                return Err(ConfigError::Invalid(format!(
                    "consumer {id}: update intervals must be non-zero"
                )));
            }
        }

        Ok(())
    }
}
