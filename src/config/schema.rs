//! Configuration schema for tfinstall
//!
//! Configuration is stored at `~/.config/tfinstall/config.toml`

use crate::release::DEFAULT_RELEASES_URL;
use crate::selector::{FallbackPolicy, DEFAULT_REPO_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Acquisition settings
    pub install: InstallConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Where binaries come from and where they are kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Cache/work directory (platform cache dir when unset)
    pub work_dir: Option<PathBuf>,

    /// Repository for source builds
    pub repo_url: String,

    /// Release server base URL
    pub releases_url: String,

    /// Build a missing release from its source tag instead of failing
    pub fallback_to_source: bool,

    /// git executable
    pub git_binary: PathBuf,

    /// go executable
    pub go_binary: PathBuf,
}

impl InstallConfig {
    /// Fallback policy selected by this config
    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.fallback_to_source {
            FallbackPolicy::BuildFromSource
        } else {
            FallbackPolicy::Disabled
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            repo_url: DEFAULT_REPO_URL.to_string(),
            releases_url: DEFAULT_RELEASES_URL.to_string(),
            fallback_to_source: false,
            git_binary: PathBuf::from("git"),
            go_binary: PathBuf::from("go"),
        }
    }
}
