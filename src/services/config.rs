use crate::error::{OcrError, Result};
use crate::models::config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration manager for service settings
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the platform config directory (`<config>/ocr-service/config.json`).
    ///
    /// Nothing is created on disk until the first save.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                OcrError::Configuration("Failed to determine config directory".to_string())
            })?
            .join("ocr-service");

        Ok(Self::at(config_dir.join("config.json")))
    }

    /// Manager for an explicit config file
    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            config_dir,
            config_path,
        }
    }

    /// Save configuration to disk
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if !self.config_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.config_dir)?;
        }

        // pretty print for human editing
        let json = serde_json::to_string_pretty(config).map_err(|e| {
            OcrError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(&self.config_path, json)?;
        debug!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// Load configuration from disk
    ///
    /// If config file doesn't exist, returns default configuration
    pub fn load(&self) -> Result<AppConfig> {
        if !self.config_exists() {
            debug!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)?;

        serde_json::from_str(&content).map_err(|e| {
            OcrError::Configuration(format!(
                "Failed to parse config file {}: {}",
                self.config_path.display(),
                e
            ))
        })
    }

    /// Get the config file path
    pub fn config_file_path(&self) -> &Path {
        &self.config_path
    }

    /// Check if config file exists
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}
