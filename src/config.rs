//! Configuration Module
//!
//! Cache instance options and the server configuration loaded from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Logger name used when an instance does not configure one.
pub const DEFAULT_LOGGER: &str = "cache";

/// Root directory of the file backend when no path is configured.
pub const DEFAULT_FILE_PATH: &str = "cache";

/// Remote backend host when none is configured.
pub const DEFAULT_REDIS_HOST: &str = "localhost";

/// Remote backend port when none is configured.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

// == Backend Kind ==
/// The storage backend behind a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    File,
    Redis,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Redis => "redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    /// Parses a backend name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "redis" => Ok(BackendKind::Redis),
            other => Err(CacheError::Configuration(format!(
                "unsupported cache type '{}'",
                other
            ))),
        }
    }
}

// == Cache Config ==
/// Options for one cache instance.
///
/// Field names follow the configuration object accepted by the instance
/// manager. Everything except `type` is optional and may be filled from
/// per-kind defaults with [`CacheConfig::merge_defaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend selector: `memory`, `file` or `redis`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Time to live in seconds, 0 or unset disables expiry
    #[serde(default)]
    pub ttl: Option<u64>,
    /// Root directory of the file backend
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Remote backend host
    #[serde(default)]
    pub host: Option<String>,
    /// Remote backend port
    #[serde(default)]
    pub port: Option<u16>,
    /// Key prefix of the remote backend
    #[serde(default)]
    pub prefix: Option<String>,
    /// Keep TTL in process instead of delegating it to the remote backend
    #[serde(rename = "inMemTTL", default)]
    pub in_mem_ttl: Option<bool>,
    /// Name of the diagnostics sink
    #[serde(default)]
    pub logger: Option<String>,
}

impl CacheConfig {
    /// Creates a config selecting the given backend kind.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind: Some(kind.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl = Some(ttl_seconds);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_in_mem_ttl(mut self, in_mem_ttl: bool) -> Self {
        self.in_mem_ttl = Some(in_mem_ttl);
        self
    }

    // == Backend Kind ==
    /// Resolves the configured backend kind.
    ///
    /// Returns a configuration error when `type` is missing or unknown.
    pub fn backend_kind(&self) -> Result<BackendKind, CacheError> {
        match &self.kind {
            Some(kind) => kind.parse(),
            None => Err(CacheError::Configuration(
                "cache type is not set".to_string(),
            )),
        }
    }

    /// TTL in seconds, 0 when disabled.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.unwrap_or(0)
    }

    pub fn logger(&self) -> &str {
        self.logger.as_deref().unwrap_or(DEFAULT_LOGGER)
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_REDIS_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_REDIS_PORT)
    }

    pub fn in_mem_ttl(&self) -> bool {
        self.in_mem_ttl.unwrap_or(false)
    }

    /// The trimmed key prefix, `None` when unset or blank.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
    }

    /// Root directory of the file backend, resolved against the working directory.
    pub fn resolved_path(&self) -> std::io::Result<PathBuf> {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PATH));
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(env::current_dir()?.join(path))
        }
    }

    // == Merge Defaults ==
    /// Fills every unset option from `defaults`, keeping values already set.
    pub fn merge_defaults(&mut self, defaults: &CacheConfig) {
        fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if target.is_none() {
                target.clone_from(source);
            }
        }

        fill(&mut self.kind, &defaults.kind);
        fill(&mut self.ttl, &defaults.ttl);
        fill(&mut self.path, &defaults.path);
        fill(&mut self.host, &defaults.host);
        fill(&mut self.port, &defaults.port);
        fill(&mut self.prefix, &defaults.prefix);
        fill(&mut self.in_mem_ttl, &defaults.in_mem_ttl);
        fill(&mut self.logger, &defaults.logger);
    }

    // == Built-in Defaults ==
    /// Per-kind defaults applied by the instance manager.
    pub fn defaults_for(kind: BackendKind) -> Self {
        let base = Self {
            logger: Some(DEFAULT_LOGGER.to_string()),
            ..Self::default()
        };
        match kind {
            BackendKind::Memory => base,
            BackendKind::File => Self {
                path: Some(PathBuf::from(DEFAULT_FILE_PATH)),
                ..base
            },
            BackendKind::Redis => Self {
                host: Some(DEFAULT_REDIS_HOST.to_string()),
                port: Some(DEFAULT_REDIS_PORT),
                prefix: Some(String::new()),
                in_mem_ttl: Some(false),
                ..base
            },
        }
    }
}

// == Server Config ==
/// Configuration of the cache server binary.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Name of the served cache instance
    pub cache_name: String,
    /// Options of the served cache instance
    pub cache: CacheConfig,
}

impl ServerConfig {
    /// Creates a new ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_NAME` - Instance name (default: `_default_`)
    /// - `CACHE_TYPE` - `memory`, `file` or `redis` (default: memory)
    /// - `CACHE_TTL` - TTL in seconds, 0 disables (default: 0)
    /// - `CACHE_PATH` - File backend root directory
    /// - `REDIS_HOST` / `REDIS_PORT` - Remote backend endpoint
    /// - `CACHE_PREFIX` - Remote backend key prefix
    /// - `CACHE_IN_MEM_TTL` - Keep TTL in process for the remote backend
    pub fn from_env() -> Self {
        let cache = CacheConfig {
            kind: Some(env::var("CACHE_TYPE").unwrap_or_else(|_| "memory".to_string())),
            ttl: parsed_var("CACHE_TTL"),
            path: env::var("CACHE_PATH").ok().map(PathBuf::from),
            host: env::var("REDIS_HOST").ok(),
            port: parsed_var("REDIS_PORT"),
            prefix: env::var("CACHE_PREFIX").ok(),
            in_mem_ttl: parsed_var("CACHE_IN_MEM_TTL"),
            logger: None,
        };

        Self {
            server_port: parsed_var("SERVER_PORT").unwrap_or(3000),
            cache_name: env::var("CACHE_NAME")
                .unwrap_or_else(|_| crate::manager::DEFAULT_INSTANCE.to_string()),
            cache,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_name: crate::manager::DEFAULT_INSTANCE.to_string(),
            cache: CacheConfig::new(BackendKind::Memory),
        }
    }
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!(" File ".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!("REDIS".parse::<BackendKind>().unwrap(), BackendKind::Redis);
    }

    #[test]
    fn test_unknown_backend_kind() {
        let result = "mongo".parse::<BackendKind>();
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_missing_kind_is_configuration_error() {
        let config = CacheConfig::default();
        assert!(matches!(
            config.backend_kind(),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_deserialize_option_names() {
        let json = r#"{"type": "redis", "ttl": 30, "prefix": " app ", "inMemTTL": true}"#;
        let config: CacheConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.backend_kind().unwrap(), BackendKind::Redis);
        assert_eq!(config.ttl_seconds(), 30);
        assert_eq!(config.prefix(), Some("app"));
        assert!(config.in_mem_ttl());
    }

    #[test]
    fn test_blank_prefix_is_none() {
        let config = CacheConfig::new(BackendKind::Redis).with_prefix("   ");
        assert_eq!(config.prefix(), None);
    }

    #[test]
    fn test_merge_defaults_keeps_explicit_values() {
        let mut config = CacheConfig::new(BackendKind::Redis).with_ttl(5);
        config.port = Some(7000);
        config.merge_defaults(&CacheConfig::defaults_for(BackendKind::Redis));

        assert_eq!(config.port(), 7000);
        assert_eq!(config.host(), DEFAULT_REDIS_HOST);
        assert_eq!(config.ttl_seconds(), 5);
        assert!(!config.in_mem_ttl());
        assert_eq!(config.logger(), DEFAULT_LOGGER);
    }

    #[test]
    fn test_relative_path_resolved_against_cwd() {
        let config = CacheConfig::new(BackendKind::File).with_path("queues");
        let resolved = config.resolved_path().unwrap();

        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("queues"));
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cache_name, "_default_");
        assert_eq!(config.cache.backend_kind().unwrap(), BackendKind::Memory);
    }
}
