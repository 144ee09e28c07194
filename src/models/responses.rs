//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::HashMap;

use serde::Serialize;

use crate::cache::Payload;

/// Response body for `PUT /store/:type/:id` and `GET /fetch/:type/:id`
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub id: String,
    /// The stored payload
    pub payload: Payload,
}

impl EntryResponse {
    pub fn new(entry_type: impl Into<String>, id: impl Into<String>, payload: Payload) -> Self {
        Self {
            entry_type: entry_type.into(),
            id: id.into(),
            payload,
        }
    }
}

/// Response body for `DELETE /remove/:type/:id`
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    /// Success message
    pub message: String,
    /// Payload the entry held before removal
    pub previous: Payload,
}

impl RemoveResponse {
    pub fn new(entry_type: &str, id: &str, previous: Payload) -> Self {
        Self {
            message: format!("Entry '{}/{}' removed", entry_type, id),
            previous,
        }
    }
}

/// Response body for `GET /list/:type`
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub count: usize,
    pub payloads: Vec<Payload>,
}

impl ListResponse {
    pub fn new(entry_type: impl Into<String>, payloads: Vec<Payload>) -> Self {
        Self {
            entry_type: entry_type.into(),
            count: payloads.len(),
            payloads,
        }
    }
}

/// Response body for `GET /map/:type`
#[derive(Debug, Clone, Serialize)]
pub struct MapResponse {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub entries: HashMap<String, Payload>,
}

impl MapResponse {
    pub fn new(entry_type: impl Into<String>, entries: HashMap<String, Payload>) -> Self {
        Self {
            entry_type: entry_type.into(),
            entries,
        }
    }
}

/// Response body for `DELETE /clear/:type`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new(entry_type: &str) -> Self {
        Self {
            message: format!("Type '{}' cleared", entry_type),
        }
    }
}

/// Response body for the info endpoint (GET /info)
#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    /// Instance name
    pub name: String,
    /// Backend kind
    #[serde(rename = "type")]
    pub kind: String,
    /// In-process TTL in milliseconds, absent when the envelope runs no timers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    /// Entries currently waiting on an expiry timer
    pub pending_expiries: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_response_uses_type_field() {
        let resp = EntryResponse::new("Q", "1", json!({"a": 1}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"type": "Q", "id": "1", "payload": {"a": 1}}));
    }

    #[test]
    fn test_list_response_counts() {
        let resp = ListResponse::new("Q", vec![json!(1), json!(2)]);
        assert_eq!(resp.count, 2);
    }

    #[test]
    fn test_info_response_omits_disabled_ttl() {
        let resp = InfoResponse {
            name: "_default_".to_string(),
            kind: "memory".to_string(),
            ttl_ms: None,
            pending_expiries: 0,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("ttl_ms"));
        assert!(json.contains(r#""type":"memory""#));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
