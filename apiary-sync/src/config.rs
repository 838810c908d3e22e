use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_PATH_VAR: &str = "APIARY_SYNC_CONFIG";
pub const API_URL_VAR: &str = "APIARY_API_URL";
pub const POLL_INTERVAL_VAR: &str = "APIARY_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub api: ApiConf,
    pub polling: PollingConf,
    pub viewport: ViewportConf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConf {
    pub base_url: String, // ex: "https://apiario.example.org/api"
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConf {
    pub interval_ms: u64,
    /// Sensor history is refetched on the initial load and then every N ticks.
    pub history_every_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConf {
    pub scroll_anchor_threshold_px: f64,
}

impl Default for ApiConf {
    fn default() -> Self {
        Self { base_url: "http://localhost:3000/api".into(), request_timeout_ms: 10_000 }
    }
}

impl Default for PollingConf {
    fn default() -> Self {
        Self { interval_ms: 3_000, history_every_ticks: 10 }
    }
}

impl Default for ViewportConf {
    fn default() -> Self {
        Self { scroll_anchor_threshold_px: 50.0 }
    }
}

impl SyncConfig {
    /// Reads `$APIARY_SYNC_CONFIG` (default `apiary.yaml`), then applies the
    /// environment overrides. Never fails: a missing or broken file means defaults.
    pub async fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "apiary.yaml".into());
        let mut config = Self::load_from(&path).await;
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Self::default();
        }

        let txt = match fs::read_to_string(path).await {
            Ok(txt) => txt,
            Err(e) => {
                warn!("cannot read config {}: {}", path.display(), e);
                return Self::default();
            }
        };
        if txt.trim().is_empty() {
            return Self::default();
        }
        Self::from_yaml_str(&txt).unwrap_or_else(|e| {
            warn!("invalid config {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn from_yaml_str(txt: &str) -> Result<Self, SyncError> {
        serde_yaml::from_str(txt).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Applies `APIARY_API_URL` / `APIARY_POLL_INTERVAL_MS` through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_VAR).filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(POLL_INTERVAL_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.polling.interval_ms = ms,
                Err(e) => warn!("ignoring {}={:?}: {}", POLL_INTERVAL_VAR, raw, e),
            }
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.polling.interval_ms == 0 {
            return Err(SyncError::Config("polling.interval_ms must be > 0".into()));
        }
        if self.polling.history_every_ticks == 0 {
            return Err(SyncError::Config("polling.history_every_ticks must be >= 1".into()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(SyncError::Config("api.base_url is empty".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }
}
