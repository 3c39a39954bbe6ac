// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is stored in `<state_dir>/config.toml`. Every field has a
//! default, so a missing file or a partial file is valid:
//!
//! ```toml
//! [remote]
//! url = "wss://guide.example.com/sync"
//!
//! [sync]
//! interval_secs = 900
//! max_retries = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::scheduler::SchedulerConfig;

const STATE_DIR_ENV: &str = "BAEDEKER_STATE_DIR";
const STATE_DIR_NAME: &str = "baedeker";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "cache.db";

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub connectivity: ConnectivitySection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Remote guide service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSection {
    /// WebSocket URL (`ws://` or `wss://`).
    #[serde(default = "default_remote_url")]
    pub url: String,
    /// Per-call timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Drain and scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSection {
    /// Periodic drain interval in seconds (default: 900).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Attempts before an operation is dropped (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay after a failing drain, in seconds (default: 30).
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,
    /// Backoff cap in seconds (default: 3600).
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

/// Reachability observation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySection {
    /// Quiet period before a transition counts as settled, in ms (default: 2000).
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Probe interval in seconds (default: 30).
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Probe connect timeout in ms (default: 3000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Local cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Unpinned entries older than this are evicted, in hours (default: 168).
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    /// How often the service runs eviction, in seconds (default: 3600).
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
    /// Entries younger than this are served without a fetch, in hours (default: 24).
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: u64,
}

fn default_remote_url() -> String {
    "ws://localhost:7890".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    15 * 60
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_initial_secs() -> u64 {
    30
}

fn default_backoff_max_secs() -> u64 {
    60 * 60
}

fn default_settle_ms() -> u64 {
    2_000
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_max_age_hours() -> u64 {
    7 * 24
}

fn default_eviction_interval_secs() -> u64 {
    60 * 60
}

fn default_staleness_hours() -> u64 {
    24
}

impl Default for RemoteSection {
    fn default() -> Self {
        RemoteSection {
            url: default_remote_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            interval_secs: default_interval_secs(),
            max_retries: default_max_retries(),
            backoff_initial_secs: default_backoff_initial_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl Default for ConnectivitySection {
    fn default() -> Self {
        ConnectivitySection {
            settle_ms: default_settle_ms(),
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            max_age_hours: default_max_age_hours(),
            eviction_interval_secs: default_eviction_interval_secs(),
            staleness_hours: default_staleness_hours(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content)
    }

    /// Parses and validates a TOML document.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let url = &self.remote.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(Error::InvalidConfig(format!(
                "invalid remote URL '{}': must be ws:// or wss://",
                url
            )));
        }
        if self.sync.max_retries == 0 {
            return Err(Error::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.sync.backoff_initial_secs > self.sync.backoff_max_secs {
            return Err(Error::InvalidConfig(
                "backoff_initial_secs must not exceed backoff_max_secs".to_string(),
            ));
        }
        let intervals = [
            ("remote.timeout_secs", self.remote.timeout_secs),
            ("sync.interval_secs", self.sync.interval_secs),
            ("sync.backoff_initial_secs", self.sync.backoff_initial_secs),
            ("connectivity.probe_interval_secs", self.connectivity.probe_interval_secs),
            ("connectivity.probe_timeout_ms", self.connectivity.probe_timeout_ms),
            ("cache.eviction_interval_secs", self.cache.eviction_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    /// Saves configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_retries: self.sync.max_retries,
            remote_timeout: Duration::from_secs(self.remote.timeout_secs),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.sync.interval_secs),
            backoff_initial: Duration::from_secs(self.sync.backoff_initial_secs),
            backoff_max: Duration::from_secs(self.sync.backoff_max_secs),
        }
    }

    pub fn settle_period(&self) -> Duration {
        Duration::from_millis(self.connectivity.settle_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_timeout_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    /// Age beyond which unpinned entries are evicted.
    pub fn max_age(&self) -> chrono::Duration {
        hours(self.cache.max_age_hours)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.cache.eviction_interval_secs)
    }

    /// Age beyond which cached content is refetched when reachable.
    pub fn staleness(&self) -> chrono::Duration {
        hours(self.cache.staleness_hours)
    }

    /// `host:port` of the remote, for reachability probing.
    ///
    /// Returns `None` when the URL has no host.
    pub fn remote_addr(&self) -> Option<String> {
        let (rest, default_port) = if let Some(rest) = self.remote.url.strip_prefix("wss://") {
            (rest, 443)
        } else if let Some(rest) = self.remote.url.strip_prefix("ws://") {
            (rest, 80)
        } else {
            return None;
        };
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if authority.is_empty() {
            return None;
        }
        // Bracketed IPv6 literals carry colons of their own.
        let has_port = match authority.rfind(']') {
            Some(close) => authority[close..].contains(':'),
            None => authority.contains(':'),
        };
        if has_port {
            Some(authority.to_string())
        } else {
            Some(format!("{}:{}", authority, default_port))
        }
    }
}

fn hours(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .unwrap_or(chrono::Duration::MAX)
}

/// Resolves the state directory: `BAEDEKER_STATE_DIR`, then the platform
/// data directory, then a relative fallback.
pub fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".baedeker"))
}

/// Default config file inside a state directory.
pub fn config_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONFIG_FILE_NAME)
}

/// SQLite database inside a state directory.
pub fn db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DB_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
