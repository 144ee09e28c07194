//! API Module
//!
//! HTTP handlers and routing that expose one cache instance over REST.
//!
//! # Endpoints
//! - `PUT /store/:type/:id` - Store the JSON body under a type and id
//! - `GET /fetch/:type/:id` - Retrieve one payload
//! - `GET /list/:type` - All payloads of a type
//! - `GET /map/:type` - All `id -> payload` pairs of a type
//! - `DELETE /remove/:type/:id` - Delete one entry
//! - `DELETE /clear/:type` - Delete every entry of a type
//! - `GET /info` - Instance name, backend and TTL
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
