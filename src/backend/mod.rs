//! Backend Module
//!
//! Raw storage primitives for `(type, id) -> payload` mappings. Backends know
//! nothing about in-process TTL; the cache envelope layers that on top.

mod file;
mod memory;
mod remote;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::cache::Payload;
use crate::config::{BackendKind, CacheConfig};
use crate::error::Result;

pub use self::file::FileBackend;
pub use self::memory::MemoryBackend;
pub use self::remote::RedisBackend;

// == Backend Trait ==
/// Storage operations every cache backend provides.
///
/// `type_` is the namespace (e.g. a queue name) and `id` identifies an entry
/// within it. Both arrive already coerced to strings.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// The kind of storage this backend uses.
    fn kind(&self) -> BackendKind;

    /// True when the backend expires entries itself, which turns off the
    /// envelope's in-process timers.
    fn native_ttl(&self) -> bool {
        false
    }

    /// Writes `payload`, overwriting any previous value, and returns it.
    async fn store(&self, type_: &str, id: &str, payload: Payload) -> Result<Payload>;

    /// Reads one entry, `None` when it does not exist.
    async fn fetch(&self, type_: &str, id: &str) -> Result<Option<Payload>>;

    /// All payloads stored under `type_`, in no particular order.
    async fn list(&self, type_: &str) -> Result<Vec<Payload>>;

    /// All `id -> payload` associations stored under `type_`.
    async fn map(&self, type_: &str) -> Result<HashMap<String, Payload>>;

    /// Deletes one entry and returns its previous payload, if any.
    async fn remove(&self, type_: &str, id: &str) -> Result<Option<Payload>>;

    /// Deletes every entry under `type_`. Succeeds when nothing is stored.
    async fn clear(&self, type_: &str) -> Result<()>;
}

// == Any Backend ==
/// One of the built-in backends, selected from configuration.
#[derive(Debug)]
pub enum AnyBackend {
    Memory(MemoryBackend),
    File(FileBackend),
    Redis(RedisBackend),
}

impl AnyBackend {
    /// Builds the backend named by `config.type`.
    ///
    /// Fails with a configuration error for unknown kinds. No I/O happens here
    /// beyond resolving the file backend's root directory.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = match config.backend_kind()? {
            BackendKind::Memory => AnyBackend::Memory(MemoryBackend::new()),
            BackendKind::File => AnyBackend::File(FileBackend::new(config.resolved_path()?)),
            BackendKind::Redis => AnyBackend::Redis(RedisBackend::from_config(config)?),
        };
        Ok(backend)
    }

    fn inner(&self) -> &dyn Backend {
        match self {
            AnyBackend::Memory(backend) => backend,
            AnyBackend::File(backend) => backend,
            AnyBackend::Redis(backend) => backend,
        }
    }
}

#[async_trait]
impl Backend for AnyBackend {
    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn native_ttl(&self) -> bool {
        self.inner().native_ttl()
    }

    async fn store(&self, type_: &str, id: &str, payload: Payload) -> Result<Payload> {
        self.inner().store(type_, id, payload).await
    }

    async fn fetch(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        self.inner().fetch(type_, id).await
    }

    async fn list(&self, type_: &str) -> Result<Vec<Payload>> {
        self.inner().list(type_).await
    }

    async fn map(&self, type_: &str) -> Result<HashMap<String, Payload>> {
        self.inner().map(type_).await
    }

    async fn remove(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        self.inner().remove(type_, id).await
    }

    async fn clear(&self, type_: &str) -> Result<()> {
        self.inner().clear(type_).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_from_config_selects_backend() {
        let memory = AnyBackend::from_config(&CacheConfig::new(BackendKind::Memory)).unwrap();
        assert_eq!(memory.kind(), BackendKind::Memory);
        assert!(!memory.native_ttl());

        let redis = AnyBackend::from_config(&CacheConfig::new(BackendKind::Redis)).unwrap();
        assert_eq!(redis.kind(), BackendKind::Redis);
    }

    #[test]
    fn test_from_config_rejects_unknown_kind() {
        let config = CacheConfig {
            kind: Some("couchdb".to_string()),
            ..CacheConfig::default()
        };
        let result = AnyBackend::from_config(&config);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }
}
