//! Background Tasks Module
//!
//! Contains background tasks spawned by cache instances.
//!
//! # Tasks
//! - TTL Expiry: Fires once per armed entry and removes it when its TTL elapses

mod expiry;

pub use expiry::{duration_millis, spawn_expiry_timer};
