use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use hitcount_core::error::{HitError, Result};
use hitcount_core::{StoreOptions, StorePath};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HitcountConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub ops: OpsSection,
}

impl Default for HitcountConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            storage: StorageSection::default(),
            log: LogSection::default(),
            ops: OpsSection::default(),
        }
    }
}

impl HitcountConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HitError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.storage.validate()?;
        self.log.validate()?;

        Ok(())
    }
}

// --------------------
// server
// --------------------
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            HitError::Config(format!(
                "server.listen must be a valid socket address ({}): {e}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}

// --------------------
// storage
// --------------------
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// `:memory:` or a database file path.
    #[serde(default = "default_storage_path")]
    pub path: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl StorageSection {
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(HitError::Config("storage.path must not be empty".into()));
        }
        if !(1..=64).contains(&self.pool_size) {
            return Err(HitError::Config(
                "storage.pool_size must be between 1 and 64".into(),
            ));
        }
        if self.busy_timeout_ms > 60_000 {
            return Err(HitError::Config(
                "storage.busy_timeout_ms must be at most 60000".into(),
            ));
        }
        // r2d2 rejects a zero checkout timeout
        if !(1..=60_000).contains(&self.connect_timeout_ms) {
            return Err(HitError::Config(
                "storage.connect_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            path: StorePath::parse(&self.path),
            pool_size: self.pool_size,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

fn default_storage_path() -> String {
    ":memory:".into()
}
fn default_pool_size() -> u32 {
    8
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

// --------------------
// log
// --------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// ECS-style JSON lines.
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default)]
    pub format: LogFormat,

    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

impl LogSection {
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(HitError::Config("log.level must not be empty".into()));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "debug".into()
}

// --------------------
// ops
// --------------------
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsSection {
    /// Mounts `/healthz`, `/readyz` and `/metrics`.
    #[serde(default = "default_ops_enabled")]
    pub enabled: bool,
}

impl Default for OpsSection {
    fn default() -> Self {
        Self {
            enabled: default_ops_enabled(),
        }
    }
}

fn default_ops_enabled() -> bool {
    true
}
