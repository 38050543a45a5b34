use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::reader::{RetryPolicy, DEFAULT_ADVANCE_THRESHOLD_PX};

pub const CONFIG_FILE_NAME: &str = "mangaverse.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    /// Translated language requested from the chapter feed.
    pub language: String,
    pub feed_limit: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub db_path: String,
    pub log_path: String,
    /// Virtual pixels per terminal row; scroll math runs in these units.
    pub cell_height_px: u32,
    pub infinite_scroll_threshold_px: u32,
    pub frame_interval_ms: u64,
    /// Widest a page is drawn, in terminal columns.
    pub page_width: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            api_base_url: "https://api.mangadex.org".to_string(),
            api_key: None,
            language: "en".to_string(),
            feed_limit: 500,
            request_timeout_secs: 30,
            max_retries: 3,
            initial_retry_delay_ms: 1000,
            db_path: data_dir.join("mangaverse.db").to_string_lossy().to_string(),
            log_path: data_dir.join("mangaverse.log").to_string_lossy().to_string(),
            cell_height_px: 16,
            infinite_scroll_threshold_px: DEFAULT_ADVANCE_THRESHOLD_PX,
            frame_interval_ms: 16,
            page_width: 80,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mangaverse")
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mangaverse").join(CONFIG_FILE_NAME))
}

impl AppConfig {
    /// Defaults, then the per-user file, then `./mangaverse.toml`, then
    /// `MANGAVERSE_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = user_config_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        let s = builder
            .add_source(File::with_name("mangaverse").required(false))
            .add_source(Environment::with_prefix("MANGAVERSE").try_parsing(true))
            .build()?;
        s.try_deserialize()
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = user_config_path().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let toml = toml::to_string(self)?;
        std::fs::write(&path, toml).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: std::time::Duration::from_millis(self.initial_retry_delay_ms),
            factor: 2,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
