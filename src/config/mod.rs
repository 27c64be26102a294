//! Configuration module for confab
//!
//! Loads config from `$XDG_CONFIG_HOME/confab/config.toml` or `~/.config/confab/config.toml`.
//! Falls back to embedded defaults if file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use confab::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Context size: {}", config.generation.context_size);
//! println!("Candidate limit: {}", config.download.max_results);
//! ```

pub mod schema;

use crate::error::{ConfabError, Result};
use std::path::{Path, PathBuf};

pub use schema::Config;

impl Config {
    /// Load config from the default location, merging with defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ConfabError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else {
            let home = std::env::var("HOME")
                .map_err(|_| ConfabError::Config("HOME env var not set".to_string()))?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("confab").join("config.toml"))
    }
}
