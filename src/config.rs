//! Application configuration, persisted as TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tradescout_search::SearchConfig;

use crate::error::{AppError, Result};
use crate::tiers::TierOverrides;

/// Environment variable overriding the CJ Dropshipping API token.
pub const CJ_TOKEN_ENV: &str = "TRADESCOUT_CJ_TOKEN";

/// Environment variable overriding the AI extraction API key.
pub const ENRICHMENT_KEY_ENV: &str = "TRADESCOUT_ENRICHMENT_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub tiers: TierOverrides,
    pub host: HostConfig,
}

/// Settings for the host bridge process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_owned(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/tradescout/config.toml`, falling back to the
    /// platform config directory.
    pub fn default_config_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .unwrap_or_else(|| PathBuf::from("/tmp"));
        base.join("tradescout").join("config.toml")
    }

    /// Override secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override secrets using `lookup` in place of the process environment.
    /// Blank values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        if let Some(token) = read(CJ_TOKEN_ENV) {
            self.search.cj_api_token = Some(token);
        }
        if let Some(key) = read(ENRICHMENT_KEY_ENV) {
            self.search.enrichment.api_key = Some(key);
        }
    }

    /// # Errors
    ///
    /// [`AppError::Config`] when the search section is invalid.
    pub fn validate(&self) -> Result<()> {
        self.search
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))
    }
}
