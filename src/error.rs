//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// A missing entry is never an error: lookups report it as `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure in the file backend
    #[error("Backend I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Network or protocol failure in the remote backend
    #[error("Remote backend failed: {0}")]
    Remote(#[from] redis::RedisError),

    /// Payload could not be encoded, or stored data could not be decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown backend type or unusable option, raised at construction
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Returns true for failures of the underlying storage (disk or network).
    pub fn is_backend_io(&self) -> bool {
        matches!(self, CacheError::Io(_) | CacheError::Remote(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Api Error Enum ==
/// Error type returned by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No entry stored under the requested type and id
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// The cache operation itself failed
    #[error(transparent)]
    Cache(#[from] CacheError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Cache(CacheError::Serialization(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Cache(err) if err.is_backend_io() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_io_classification() {
        let io = CacheError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_backend_io());

        let config = CacheError::Configuration("unknown type".to_string());
        assert!(!config.is_backend_io());
    }

    #[test]
    fn test_configuration_display() {
        let err = CacheError::Configuration("unsupported cache type 'mongo'".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: unsupported cache type 'mongo'"
        );
    }

    #[test]
    fn test_not_found_status() {
        let response = ApiError::NotFound("Q/1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_io_error_status() {
        let err = CacheError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_configuration_error_is_internal() {
        let err = CacheError::Configuration("unsupported cache type 'mongo'".to_string());
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
