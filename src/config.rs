use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7431".to_string()
}

/// Hosted memory-backend API settings. The per-tenant API key is stored
/// encrypted in the credential store, not here.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_base")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend_base() -> String {
    "https://api.backboard.io/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Google Drive API settings. The bearer token is read from the environment
/// at startup; acquiring it (the OAuth dance) happens outside this process.
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_drive_base")]
    pub api_base: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_drive_base(),
            token_env: default_token_env(),
        }
    }
}

fn default_drive_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_token_env() -> String {
    "DRIVE_ACCESS_TOKEN".to_string()
}

/// Polling cadence and the bounded indexing wait.
#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    /// Seconds between poll cycles. Fixed — the scheduler never backs off.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Ceiling on the wait for an artifact to reach a terminal index state.
    #[serde(default = "default_index_wait_secs")]
    pub index_wait_secs: u64,
    /// Spacing between index-status checks.
    #[serde(default = "default_index_poll_secs")]
    pub index_poll_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            index_wait_secs: default_index_wait_secs(),
            index_poll_secs: default_index_poll_secs(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn index_wait(&self) -> Duration {
        Duration::from_secs(self.index_wait_secs)
    }

    pub fn index_poll(&self) -> Duration {
        Duration::from_secs(self.index_poll_secs)
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_index_wait_secs() -> u64 {
    60
}

fn default_index_poll_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            raw_base: default_raw_base(),
        }
    }
}

fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.poller.interval_secs == 0 {
        anyhow::bail!("poller.interval_secs must be > 0");
    }
    if config.poller.index_poll_secs == 0 {
        anyhow::bail!("poller.index_poll_secs must be > 0");
    }
    if config.poller.index_wait_secs < config.poller.index_poll_secs {
        anyhow::bail!("poller.index_wait_secs must be >= poller.index_poll_secs");
    }
    if config.backend.base_url.is_empty() {
        anyhow::bail!("backend.base_url must not be empty");
    }
    if config.drive.api_base.is_empty() {
        anyhow::bail!("drive.api_base must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str("[db]\npath = \"/tmp/relay.sqlite\"\n").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7431");
        assert_eq!(config.poller.interval_secs, 300);
        assert_eq!(config.poller.index_wait_secs, 60);
        assert_eq!(config.poller.index_poll_secs, 2);
        assert_eq!(config.github.raw_base, "https://raw.githubusercontent.com");
    }

    #[test]
    fn overrides_are_honored() {
        let toml = r#"
[db]
path = "/tmp/relay.sqlite"

[poller]
interval_secs = 30
index_wait_secs = 10
index_poll_secs = 1
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.poller.interval(), Duration::from_secs(30));
        assert_eq!(config.poller.index_wait(), Duration::from_secs(10));
    }
}
