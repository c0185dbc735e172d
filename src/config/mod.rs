//! Configuration management for tfinstall

pub mod schema;

pub use schema::Config;

use crate::error::{InstallError, InstallResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Environment variable overriding the work directory
pub const WORK_DIR_ENV: &str = "TFINSTALL_WORK_DIR";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tfinstall")
            .join("config.toml")
    }

    /// Work directory used when neither the selector nor the caller picks one.
    ///
    /// Precedence: `TFINSTALL_WORK_DIR`, then `install.work_dir`, then the
    /// platform cache directory.
    pub fn work_dir(config: &Config) -> PathBuf {
        if let Some(dir) = std::env::var_os(WORK_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(ref dir) = config.install.work_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tfinstall")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> InstallResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> InstallResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| InstallError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| InstallError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> InstallResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                InstallError::io(format!("creating config dir {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            InstallError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
