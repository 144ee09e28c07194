//! Instance Manager
//!
//! Resolves named cache configurations and builds cache instances from them.

use std::collections::HashMap;

use tracing::debug;

use crate::backend::AnyBackend;
use crate::cache::Cache;
use crate::config::{BackendKind, CacheConfig};
use crate::error::Result;

/// Name used when no instance name is given.
pub const DEFAULT_INSTANCE: &str = "_default_";

// == Cache Manager ==
/// Registry of named instance configs plus per-kind defaults.
///
/// Each call to [`CacheManager::instance`] builds a fresh cache; instances are
/// not shared or memoised.
#[derive(Debug, Clone)]
pub struct CacheManager {
    configs: HashMap<String, CacheConfig>,
    defaults: HashMap<BackendKind, CacheConfig>,
    default_kind: BackendKind,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Creates a manager holding only the built-in defaults.
    pub fn new() -> Self {
        let mut manager = Self {
            configs: HashMap::new(),
            defaults: HashMap::new(),
            default_kind: BackendKind::Memory,
        };
        manager.reset();
        manager
    }

    /// Drops every configured instance and restores the built-in defaults.
    pub fn reset(&mut self) {
        self.configs.clear();
        self.default_kind = BackendKind::Memory;
        self.defaults = [BackendKind::Memory, BackendKind::File, BackendKind::Redis]
            .into_iter()
            .map(|kind| (kind, CacheConfig::defaults_for(kind)))
            .collect();
    }

    // == Configure ==
    /// Merges instance configs, and optionally per-kind defaults, over the
    /// current ones. Options set in the new values win; unset ones keep their
    /// previous value.
    pub fn configure(
        &mut self,
        configs: HashMap<String, CacheConfig>,
        defaults: Option<HashMap<BackendKind, CacheConfig>>,
    ) {
        merge_into(&mut self.configs, configs);
        if let Some(defaults) = defaults {
            merge_into(&mut self.defaults, defaults);
        }
    }

    /// Backend kind used for names without a configuration.
    pub fn set_default_kind(&mut self, kind: BackendKind) {
        self.default_kind = kind;
    }

    pub fn default_kind(&self) -> BackendKind {
        self.default_kind
    }

    /// The stored config of `name`, before defaults are applied.
    pub fn config(&self, name: &str) -> Option<&CacheConfig> {
        self.configs.get(name)
    }

    // == Resolve ==
    /// The effective config of `name`, with defaults applied and the kind normalised.
    pub fn resolve(&self, name: &str) -> Result<CacheConfig> {
        let config = self
            .configs
            .get(name)
            .cloned()
            .unwrap_or_else(|| CacheConfig::new(self.default_kind));
        self.complete(config)
    }

    fn complete(&self, mut config: CacheConfig) -> Result<CacheConfig> {
        let kind = match config.kind {
            Some(_) => config.backend_kind()?,
            None => self.default_kind,
        };
        config.kind = Some(kind.as_str().to_string());
        if let Some(defaults) = self.defaults.get(&kind) {
            config.merge_defaults(defaults);
        }
        Ok(config)
    }

    // == Instance ==
    /// Builds the cache configured under `name`.
    ///
    /// Unknown names get a cache of the default kind.
    pub fn instance(&self, name: &str) -> Result<Cache<AnyBackend>> {
        let config = self.resolve(name)?;
        debug!(cache = %name, kind = ?config.kind, "Building cache instance");
        Cache::open(name, &config)
    }

    /// Builds a cache named `name` from `config`, ignoring any stored config.
    pub fn instance_with(&self, name: &str, config: CacheConfig) -> Result<Cache<AnyBackend>> {
        let config = self.complete(config)?;
        Cache::open(name, &config)
    }
}

fn merge_into<K: std::hash::Hash + Eq>(
    target: &mut HashMap<K, CacheConfig>,
    source: HashMap<K, CacheConfig>,
) {
    for (key, mut config) in source {
        if let Some(existing) = target.get(&key) {
            config.merge_defaults(existing);
        }
        target.insert(key, config);
    }
}
