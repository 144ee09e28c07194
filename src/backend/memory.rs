//! In-Memory Backend
//!
//! Nested `type -> (id -> payload)` maps held in process memory.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Backend;
use crate::cache::Payload;
use crate::config::BackendKind;
use crate::error::Result;

// == Memory Backend ==
/// Process-local storage, discarded when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Payloads grouped by type, then by id
    types: RwLock<HashMap<String, HashMap<String, Payload>>>,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of entries stored under `type_`.
    pub async fn len(&self, type_: &str) -> usize {
        self.types.read().await.get(type_).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn store(&self, type_: &str, id: &str, payload: Payload) -> Result<Payload> {
        let mut types = self.types.write().await;
        types
            .entry(type_.to_string())
            .or_default()
            .insert(id.to_string(), payload.clone());
        Ok(payload)
    }

    async fn fetch(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        let types = self.types.read().await;
        Ok(types.get(type_).and_then(|entries| entries.get(id)).cloned())
    }

    async fn list(&self, type_: &str) -> Result<Vec<Payload>> {
        let types = self.types.read().await;
        Ok(types
            .get(type_)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn map(&self, type_: &str) -> Result<HashMap<String, Payload>> {
        let types = self.types.read().await;
        Ok(types.get(type_).cloned().unwrap_or_default())
    }

    async fn remove(&self, type_: &str, id: &str) -> Result<Option<Payload>> {
        let mut types = self.types.write().await;
        let Some(entries) = types.get_mut(type_) else {
            return Ok(None);
        };

        let previous = entries.remove(id);
        if entries.is_empty() {
            types.remove(type_);
        }
        Ok(previous)
    }

    async fn clear(&self, type_: &str) -> Result<()> {
        self.types.write().await.remove(type_);
        Ok(())
    }
}
