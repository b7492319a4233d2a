use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::{MediaFormat, Quality};

/// Event-stream reconnect parameters (optional `[stream]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Delay before the first reconnect, in milliseconds. A `retry:` field sent
    /// by the server replaces it for the rest of the subscription.
    pub reconnect_base_ms: u64,
    /// Upper bound on the reconnect delay in seconds.
    pub reconnect_max_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: 3000,
            reconnect_max_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/mdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdlConfig {
    /// Base URL of the download service, e.g. `http://127.0.0.1:5000/`.
    pub server_url: String,
    /// Interval of the status poll that backs up the event stream.
    pub poll_interval_ms: u64,
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for JSON endpoints (info lookups can be slow).
    pub request_timeout_secs: u64,
    /// Give up on a job when neither channel reports a percent advance for this long.
    /// None = wait indefinitely.
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,
    /// Format preselected for new jobs.
    #[serde(default)]
    pub default_format: MediaFormat,
    /// Quality preselected for YouTube video jobs.
    #[serde(default)]
    pub default_quality: Quality,
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for MdlConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000/".to_string(),
            poll_interval_ms: 5000,
            connect_timeout_secs: 15,
            request_timeout_secs: 120,
            stall_timeout_secs: None,
            default_format: MediaFormat::Video,
            default_quality: Quality::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl MdlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdlConfig> {
    load_or_init_at(&config_path()?)
}

/// Like `load_or_init` but for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<MdlConfig> {
    if !path.exists() {
        let default_cfg = MdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("write default config {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: MdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
