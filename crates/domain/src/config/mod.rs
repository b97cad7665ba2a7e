mod api;
mod observability;
mod storage;

pub use api::*;
pub use observability::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Environment variable that overrides `api.base_url` after loading.
pub const BASE_URL_ENV: &str = "FOLIO_API_BASE_URL";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a config file, or return defaults when `path` does not exist.
    ///
    /// The `FOLIO_API_BASE_URL` override is applied afterwards either way.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml(&raw)
                .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                config.api.base_url = url;
            }
        }
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// An empty vec means the config is usable as-is.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "api.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "api.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{base_url}\")"
                ),
            });
        } else if base_url.starts_with("http://")
            && !(base_url.contains("localhost") || base_url.contains("127.0.0.1"))
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "api.base_url".into(),
                message: "bearer tokens will be sent over plain http".into(),
            });
        }

        if self.api.timeout_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "api.timeout_ms".into(),
                message: "no client-side timeout; a stalled backend blocks until the OS gives up"
                    .into(),
            });
        }

        if self.storage.backend == StorageBackend::File && self.storage.resolved_path().is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "storage.path".into(),
                message: "no path configured and the home directory could not be determined"
                    .into(),
            });
        }

        issues
    }
}
