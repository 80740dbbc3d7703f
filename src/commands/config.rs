use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::models::config::{AppConfig, EngineKind, Language};
use crate::services::config::ConfigManager;

/// Config manager for an explicit file or the platform default location
pub fn config_manager(path: Option<&Path>) -> Result<ConfigManager> {
    match path {
        Some(path) => Ok(ConfigManager::at(path)),
        None => ConfigManager::new(),
    }
}

/// Load the stored configuration, defaults when no file exists
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let manager = config_manager(path)?;
    let config = manager.load()?;
    info!(
        "Configuration from {} (exists={})",
        manager.config_file_path().display(),
        manager.config_exists()
    );
    Ok(config)
}

/// Write the configuration back
pub fn save_config(path: Option<&Path>, config: &AppConfig) -> Result<()> {
    config_manager(path)?.save(config)
}

/// Load, apply `overrides`, and write the result back when `persist` is set
pub fn update_config(path: Option<&Path>, overrides: &ConfigOverrides, persist: bool) -> Result<AppConfig> {
    let config = overrides.apply(load_config(path)?);
    if persist {
        save_config(path, &config)?;
        info!("Configuration saved");
    }
    Ok(config)
}

/// Command-line values that win over the stored configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub engine: Option<EngineKind>,
    pub language: Option<Language>,
    pub use_gpu: bool,
    pub workers: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(engine) = self.engine {
            if engine != config.engine.engine_kind {
                // a stored language belongs to the stored engine
                config.engine.language = None;
            }
            config.engine.engine_kind = engine;
        }
        if let Some(language) = &self.language {
            config.engine.language = Some(language.clone());
        }
        if self.use_gpu {
            config.engine.use_gpu = true;
        }
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        config
    }
}
