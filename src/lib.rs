//! Mini Cache - Namespaced key-value caching with sliding TTL
//!
//! Stores JSON payloads under `(type, id)` pairs in memory, on disk or in
//! Redis, behind one cache envelope that restarts an entry's TTL whenever it
//! is stored or fetched.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use backend::{AnyBackend, Backend, FileBackend, MemoryBackend, RedisBackend};
pub use cache::{Cache, Payload};
pub use config::{BackendKind, CacheConfig, ServerConfig};
pub use error::{CacheError, Result};
pub use manager::{CacheManager, DEFAULT_INSTANCE};
