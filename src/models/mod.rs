//! Response models for the cache server API
//!
//! DTOs serialized into HTTP response bodies. Request bodies are raw JSON
//! payloads and need no model.

pub mod responses;

pub use responses::{
    ClearResponse, EntryResponse, ErrorResponse, HealthResponse, InfoResponse, ListResponse,
    MapResponse, RemoveResponse,
};
