//! Proxy configuration.
//!
//! Layering, later sources win:
//! 1. built-in defaults (`ProxyConfig::default()`)
//! 2. an optional YAML file
//! 3. environment variables prefixed with `RPC_PROXY__`, nested keys split on `__`
//!    (e.g. `RPC_PROXY__RETRY__MAX_BACKOFF_MS=2000`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::command::ServiceCommand;

pub const ENV_PREFIX: &str = "RPC_PROXY__";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("invalid proxy configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Command used for any service without an explicit override.
    pub command: ServiceCommand,
    /// Per-service command overrides keyed by service id.
    pub commands: HashMap<String, ServiceCommand>,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Backoff settings for the failover cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// TTLs of the resolver caches and the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of `CachedCommandResolver::from_config`.
    pub command_ttl_ms: u64,
    /// TTL of `CachedRouteResolver::from_config`.
    pub route_ttl_ms: u64,
    /// Used by the cache interceptor when a policy sets no TTL of its own.
    pub response_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            command_ttl_ms: 30_000,
            route_ttl_ms: 10_000,
            response_ttl_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Compact,
        }
    }
}

impl ProxyConfig {
    /// Layered figment: defaults, then `path` (if any), then the environment.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ProxyConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from the standard layers.
    ///
    /// # Errors
    /// Returns `ConfigError::FileNotFound` if `path` does not exist and
    /// `ConfigError::Invalid` if any layer fails to deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path
            && !path.exists()
        {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Self::from_figment(&Self::figment(path))
    }

    /// # Errors
    /// Returns `ConfigError::Invalid` if extraction fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// Command for `service_id`: its override if present, else the default.
    #[must_use]
    pub fn command_for(&self, service_id: &str) -> &ServiceCommand {
        self.commands.get(service_id).unwrap_or(&self.command)
    }
}
