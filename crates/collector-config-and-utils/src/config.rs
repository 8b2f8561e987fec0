//! Configuration management for the collector.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default collect endpoint for batched events.
pub const DEFAULT_COLLECT_ENDPOINT: &str = "https://ai.clarity.ms/collect";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default number of events per dispatched chunk.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default drain cadence in seconds.
pub const DEFAULT_DRAIN_INTERVAL_SECS: u64 = 300;

/// Default send timeout in milliseconds.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 1000;

/// Default redirect budget for a single send.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Main collector configuration.
///
/// Every field has a default so partial config files are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Project identifier placed in every event envelope.
    pub project_id: Option<String>,
    /// Site identifier. Event production is suppressed without it.
    pub site_id: Option<String>,
    /// Base URL of the instrumented site, joined with each request URI.
    pub site_url: String,
    /// Remote collect endpoint.
    pub collect_endpoint: String,
    /// Maximum events per dispatched chunk.
    pub batch_size: usize,
    /// Seconds between drain cycles.
    pub drain_interval_secs: u64,
    /// Send timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Redirects followed per send.
    pub max_redirects: usize,
    /// Client version reported in the envelope.
    pub client_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            project_id: None,
            site_id: None,
            site_url: "http://localhost".to_string(),
            collect_endpoint: DEFAULT_COLLECT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            drain_interval_secs: DEFAULT_DRAIN_INTERVAL_SECS,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).and_then(non_empty);

        if let Some(log_level) = lookup("COLLECTOR_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(project_id) = lookup("COLLECTOR_PROJECT_ID") {
            self.project_id = Some(project_id);
        }
        if let Some(site_id) = lookup("COLLECTOR_SITE_ID") {
            self.site_id = Some(site_id);
        }
        if let Some(endpoint) = lookup("COLLECTOR_ENDPOINT") {
            self.collect_endpoint = endpoint;
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.batch_size == 0 {
            return Err(CoreError::Config("batch_size must be at least 1".to_string()));
        }
        if self.drain_interval_secs == 0 {
            return Err(CoreError::Config(
                "drain_interval_secs must be at least 1".to_string(),
            ));
        }
        self.collect_endpoint()?;
        self.site_url()?;
        Ok(())
    }

    /// Get the collect endpoint as a parsed URL.
    pub fn collect_endpoint(&self) -> CoreResult<Url> {
        Url::parse(&self.collect_endpoint).map_err(|source| CoreError::InvalidUrl {
            field: "collect_endpoint",
            source,
        })
    }

    /// Get the site base URL as a parsed URL.
    pub fn site_url(&self) -> CoreResult<Url> {
        Url::parse(&self.site_url).map_err(|source| CoreError::InvalidUrl {
            field: "site_url",
            source,
        })
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
