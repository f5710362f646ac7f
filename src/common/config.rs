//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Connection and retry settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Server launcher settings
    #[serde(default)]
    pub launcher: LauncherConfig,

    /// Markdown fence modifiers
    #[serde(default)]
    pub markers: MarkerConfig,
}

/// Connection settings
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Consecutive failed connection attempts before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed pause between connection attempts
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Timeout for a single TCP connect plus handshake
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for a single script submission
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_interval_secs: default_retry_interval(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ConnectionConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

fn default_max_retries() -> u32 {
    25
}
fn default_retry_interval() -> u64 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    600
}

/// Launcher settings
#[derive(Debug, Deserialize, Default)]
pub struct LauncherConfig {
    /// Compose command used to start and stop the server,
    /// e.g. `docker compose -f docker-compose.yml`
    #[serde(default)]
    pub compose: Option<String>,
}

/// Modifiers recognised on a fence opener line
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MarkerConfig {
    /// Any of these suppresses the snippet entirely
    #[serde(default = "default_skip")]
    pub skip: Vec<String>,

    /// Marks a snippet that must raise an execution error
    #[serde(default = "default_should_fail")]
    pub should_fail: String,

    /// Prefix of the test-set grouping tag, followed by an integer
    #[serde(default = "default_test_set")]
    pub test_set: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            skip: default_skip(),
            should_fail: default_should_fail(),
            test_set: default_test_set(),
        }
    }
}

fn default_skip() -> Vec<String> {
    vec!["skip-test".to_string(), "syntax".to_string()]
}
fn default_should_fail() -> String {
    "should-fail".to_string()
}
fn default_test_set() -> String {
    "test-set=".to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| super::Error::file_read(path, &e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
