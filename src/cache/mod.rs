//! Cache Module
//!
//! The cache envelope: sliding TTL and uniform operations over any backend.

mod callback;
mod envelope;
mod registry;


pub use callback::spawn_with_handler;
pub use envelope::Cache;

/// Caller-owned value stored under a `(type, id)` pair.
pub type Payload = serde_json::Value;
