use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::SyncConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    pub api: ApiConfig,
    pub sync: SyncSettings,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub ws_gateway_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub page_size: u64,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub tokens_max_age_ms: u64,
    pub listings_max_age_ms: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            sync: SyncSettings::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ic.news".to_owned(),
            ws_gateway_url: "wss://api.ic.news/ws/".to_owned(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            poll_interval_seconds: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tokens_max_age_ms: 60_000,
            listings_max_age_ms: 30_000,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl SyncSettings {
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            page_size: self.page_size,
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
        }
    }
}

impl CacheConfig {
    pub fn tokens_max_age(&self) -> Duration {
        Duration::from_millis(self.tokens_max_age_ms)
    }

    pub fn listings_max_age(&self) -> Duration {
        Duration::from_millis(self.listings_max_age_ms)
    }
}

impl NewsConfig {
    pub fn config_file_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("could not locate the config directory")?;
        let app_config_dir = config_dir.join("icnews");
        std::fs::create_dir_all(&app_config_dir)?;
        Ok(app_config_dir.join("config.json"))
    }

    /// Load the configuration file, falling back to defaults (and trying
    /// to write them out) when it is missing or unreadable.
    pub fn load() -> Self {
        match Self::load_from_file() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "could not load configuration, using defaults");
                let default_config = Self::default();
                if let Err(save_err) = default_config.save() {
                    tracing::warn!(error = %save_err, "could not save default configuration");
                }
                default_config
            }
        }
    }

    fn load_from_file() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::config_file_path()?;
        let config_content = std::fs::read_to_string(config_path)?;
        let config: NewsConfig = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::config_file_path()?;
        let config_json = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, config_json)?;
        Ok(())
    }
}
