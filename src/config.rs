//! Engine configuration.
//!
//! Loaded from `--config <file>` or from `deplens.toml` in the project root.
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::registry::RetryConfig;

/// File name looked up in the project root when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "deplens.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    TomlError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub enrich: EnrichSection,
    pub retry: RetrySection,
    pub cache: CacheSection,
    pub registries: RegistryConfig,
}

/// Worker pool settings for registry enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichSection {
    /// Maximum number of registry lookups in flight
    pub concurrency: usize,
    /// Overall deadline for the enrichment stage (in seconds)
    pub timeout_secs: u64,
    /// Serve cached data only
    pub offline: bool,
}

impl Default for EnrichSection {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout_secs: 60,
            offline: false,
        }
    }
}

/// Retry policy (serializable form of [`RetryConfig`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 4000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Response cache settings. Without a path the cache lives for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub path: Option<PathBuf>,
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            path: None,
            ttl_secs: 86_400,
        }
    }
}

impl CacheSection {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Registry and advisory endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub npm: String,
    pub crates: String,
    pub pypi: String,
    /// Maven repositories, tried in order
    pub maven: Vec<String>,
    /// OSV API root; advisories are skipped when unset
    pub osv: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            npm: "https://registry.npmjs.org".to_string(),
            crates: "https://crates.io".to_string(),
            pypi: "https://pypi.org".to_string(),
            maven: vec!["https://repo1.maven.org/maven2".to_string()],
            osv: Some("https://api.osv.dev".to_string()),
            request_timeout_secs: 15,
            user_agent: format!("deplens/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration document.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content).map_err(|source| ConfigError::TomlError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration for a run.
    ///
    /// An explicit `path` must exist. Otherwise `deplens.toml` in `root` is
    /// used when present, and the defaults when it is not.
    pub fn load(path: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    tracing::debug!("no {} found, using defaults", CONFIG_FILE_NAME);
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::IoError {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Self::from_toml(&content, &path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enrich.concurrency == 0 {
            return Err(ConfigError::InvalidValue("enrich.concurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue("retry.max_attempts must be at least 1".into()));
        }
        if self.registries.maven.is_empty() {
            return Err(ConfigError::InvalidValue("registries.maven must list a repository".into()));
        }
        Ok(())
    }
}
