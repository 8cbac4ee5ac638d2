//! Configuration file handling.
//!
//! One JSON file holds every section. A missing file is written out with
//! defaults so the user has something to fill in.

use anyhow::{Context, Result};
use booksync_sync::{DoubanConfig, EngineConfig, FeishuConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// HTTP listener and local storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// SQLite file holding saved field mappings.
    pub mapping_db: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            mapping_db: "config/mappings.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub feishu: FeishuConfig,
    pub douban: DoubanConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Loads the config at `path`, creating it with defaults if absent.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from {:?}", path);
            let text = fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&text).context("Failed to parse config file")
        } else {
            info!("Writing default config to {:?}", path);
            let config = Self::default();
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).context("Failed to create config directory")?;
            }
            let text = serde_json::to_string_pretty(&config)?;
            fs::write(path, text).context("Failed to write config file")?;
            Ok(config)
        }
    }

    /// Address the HTTP listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
