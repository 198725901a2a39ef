//! Facade configuration.
//!
//! Configuration is loaded from `~/.config/sandfs/config.toml`, or passed
//! explicitly at construction. Each facade owns its own copy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use sandfs_types::StorageError;
use serde::{Deserialize, Serialize};

/// Configuration for one [`SandFs`](crate::SandFs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    /// Virtual root inside the backend.
    #[serde(default = "default_root")]
    pub root: String,

    /// Send every payload through base64 transport.
    #[serde(default)]
    pub base64_always: bool,

    /// Publish mutation events. Without it `on`/`watch` only see immediate
    /// deliveries.
    #[serde(default = "default_watcher")]
    pub watcher: bool,

    /// Report swallowed backend failures to the warning sink.
    #[serde(default)]
    pub warnings: bool,

    /// Compare path segments ignoring ASCII case.
    #[serde(default)]
    pub case_insensitive: bool,
}

fn default_root() -> String {
    "/".to_string()
}

fn default_watcher() -> bool {
    true
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            base64_always: false,
            watcher: default_watcher(),
            warnings: false,
            case_insensitive: false,
        }
    }
}

impl FsConfig {
    /// A default configuration rooted at `root`.
    pub fn rooted(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "sandfs")
            .context("Could not determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// A backend failure a best-effort operation chose to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swallowed {
    /// Facade operation that swallowed it (`init`, `clear`, ...).
    pub operation: &'static str,
    pub path: String,
    pub error: StorageError,
}

/// Receives swallowed failures when `warnings` is enabled.
pub type WarningSink = Arc<dyn Fn(&Swallowed) + Send + Sync>;
