//! Configuration management for CVForge
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{CvforgeError, Result};
use crate::query::{CachePolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for CVForge
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Freshness and eviction windows for the query cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Retry/backoff policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
    /// Where the session token is persisted
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every relative endpoint is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds), enforced by the transport
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long the conversation list is served without a network call
    #[serde(default = "default_conversation_list_fresh")]
    pub conversation_list_fresh_secs: u64,

    /// How long a single conversation is served without a network call
    #[serde(default = "default_conversation_fresh")]
    pub conversation_fresh_secs: u64,

    /// How long a template page is served without a network call
    #[serde(default = "default_templates_fresh")]
    pub templates_fresh_secs: u64,

    /// How long an unobserved entry survives before eviction
    #[serde(default = "default_gc_grace")]
    pub gc_grace_secs: u64,
}

fn default_conversation_list_fresh() -> u64 {
    60
}

fn default_conversation_fresh() -> u64 {
    30
}

fn default_templates_fresh() -> u64 {
    120
}

fn default_gc_grace() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            conversation_list_fresh_secs: default_conversation_list_fresh(),
            conversation_fresh_secs: default_conversation_fresh(),
            templates_fresh_secs: default_templates_fresh(),
            gc_grace_secs: default_gc_grace(),
        }
    }
}

impl CacheConfig {
    /// Converts the configured windows into a [`CachePolicy`].
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            conversation_list_fresh: Duration::from_secs(self.conversation_list_fresh_secs),
            conversation_fresh: Duration::from_secs(self.conversation_fresh_secs),
            templates_fresh: Duration::from_secs(self.templates_fresh_secs),
            gc_grace: Duration::from_secs(self.gc_grace_secs),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Converts the configured bounds into a [`RetryPolicy`].
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Token store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// OS native credential store
    Keyring,
    /// Embedded sled database on disk
    #[default]
    File,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = CvforgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyring" => Ok(StorageBackend::Keyring),
            "file" => Ok(StorageBackend::File),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(CvforgeError::Config(format!(
                "Invalid storage backend: {}. Must be one of: keyring, file, memory",
                other
            ))),
        }
    }
}

/// Token storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Backend used for the session token
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database directory for the `file` backend; defaults to the platform
    /// data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CvforgeError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CvforgeError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("CVFORGE_API_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("CVFORGE_API_TIMEOUT") {
            match timeout.parse() {
                Ok(secs) => self.api.timeout_seconds = secs,
                Err(_) => tracing::warn!("Ignoring non-numeric CVFORGE_API_TIMEOUT={}", timeout),
            }
        }

        if let Ok(backend) = std::env::var("CVFORGE_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.storage.backend = b,
                Err(e) => tracing::warn!("Ignoring CVFORGE_STORAGE_BACKEND: {}", e),
            }
        }

        if let Ok(path) = std::env::var("CVFORGE_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.base_url {
            tracing::debug!("Using base URL override: {}", base_url);
            self.api.base_url = base_url.clone();
        }
        if let Some(backend) = cli.storage {
            self.storage.backend = backend;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| {
            CvforgeError::Config(format!("api.base_url is not a valid URL: {}", e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(CvforgeError::Config(format!(
                "api.base_url must use http or https, got {}",
                url.scheme()
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(CvforgeError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.retry.max_retries > 10 {
            return Err(CvforgeError::Config(
                "retry.max_retries must be less than or equal to 10".to_string(),
            )
            .into());
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(CvforgeError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
