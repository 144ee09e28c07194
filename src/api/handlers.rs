//! API Handlers
//!
//! HTTP request handlers, one per cache operation.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::backend::AnyBackend;
use crate::cache::{Cache, Payload};
use crate::error::ApiError;
use crate::models::{
    ClearResponse, EntryResponse, HealthResponse, InfoResponse, ListResponse, MapResponse,
    RemoveResponse,
};
use crate::tasks::duration_millis;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Application state shared across all handlers.
///
/// The cache is internally shared, so cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cache<AnyBackend>,
}

impl AppState {
    pub fn new(cache: Cache<AnyBackend>) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /store/:type/:id
///
/// The request body is the JSON payload to store.
pub async fn store_handler(
    State(state): State<AppState>,
    Path((entry_type, id)): Path<(String, String)>,
    Json(payload): Json<Payload>,
) -> ApiResult<EntryResponse> {
    let stored = state.cache.store(&entry_type, &id, payload).await?;
    Ok(Json(EntryResponse::new(entry_type, id, stored)))
}

/// Handler for GET /fetch/:type/:id
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path((entry_type, id)): Path<(String, String)>,
) -> ApiResult<EntryResponse> {
    match state.cache.fetch(&entry_type, &id).await? {
        Some(payload) => Ok(Json(EntryResponse::new(entry_type, id, payload))),
        None => Err(ApiError::NotFound(format!("{}/{}", entry_type, id))),
    }
}

/// Handler for GET /list/:type
pub async fn list_handler(
    State(state): State<AppState>,
    Path(entry_type): Path<String>,
) -> ApiResult<ListResponse> {
    let payloads = state.cache.list(&entry_type).await?;
    Ok(Json(ListResponse::new(entry_type, payloads)))
}

/// Handler for GET /map/:type
pub async fn map_handler(
    State(state): State<AppState>,
    Path(entry_type): Path<String>,
) -> ApiResult<MapResponse> {
    let entries = state.cache.map(&entry_type).await?;
    Ok(Json(MapResponse::new(entry_type, entries)))
}

/// Handler for DELETE /remove/:type/:id
///
/// Responds 404 when nothing was stored under the pair.
pub async fn remove_handler(
    State(state): State<AppState>,
    Path((entry_type, id)): Path<(String, String)>,
) -> ApiResult<RemoveResponse> {
    match state.cache.remove(&entry_type, &id).await? {
        Some(previous) => Ok(Json(RemoveResponse::new(&entry_type, &id, previous))),
        None => Err(ApiError::NotFound(format!("{}/{}", entry_type, id))),
    }
}

/// Handler for DELETE /clear/:type
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(entry_type): Path<String>,
) -> ApiResult<ClearResponse> {
    state.cache.clear(&entry_type).await?;
    Ok(Json(ClearResponse::new(&entry_type)))
}

/// Handler for GET /info
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    let cache = &state.cache;
    Json(InfoResponse {
        name: cache.name().to_string(),
        kind: cache.kind().to_string(),
        ttl_ms: cache.ttl().map(duration_millis),
        pending_expiries: cache.pending_expiries().await,
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn test_state() -> AppState {
        let cache = Cache::new("handlers", AnyBackend::Memory(MemoryBackend::new()), None);
        AppState::new(cache)
    }

    fn pair(entry_type: &str, id: &str) -> Path<(String, String)> {
        Path((entry_type.to_string(), id.to_string()))
    }

    #[tokio::test]
    async fn test_store_and_fetch_handler() {
        let state = test_state();

        let stored = store_handler(State(state.clone()), pair("Q", "1"), Json(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(stored.payload, json!({"a": 1}));

        let fetched = fetch_handler(State(state), pair("Q", "1")).await.unwrap();
        assert_eq!(fetched.entry_type, "Q");
        assert_eq!(fetched.payload, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let result = fetch_handler(State(test_state()), pair("Q", "missing")).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_handler() {
        let state = test_state();
        state.cache.store("Q", "1", json!("x")).await.unwrap();

        let removed = remove_handler(State(state.clone()), pair("Q", "1")).await.unwrap();
        assert_eq!(removed.previous, json!("x"));

        let again = remove_handler(State(state), pair("Q", "1")).await;
        assert!(matches!(again, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_map_and_clear_handlers() {
        let state = test_state();
        state.cache.store("Q", "1", json!(1)).await.unwrap();
        state.cache.store("Q", "2", json!(2)).await.unwrap();

        let list = list_handler(State(state.clone()), Path("Q".to_string())).await.unwrap();
        assert_eq!(list.count, 2);

        let map = map_handler(State(state.clone()), Path("Q".to_string())).await.unwrap();
        assert_eq!(map.entries.get("2"), Some(&json!(2)));

        clear_handler(State(state.clone()), Path("Q".to_string())).await.unwrap();
        let list = list_handler(State(state), Path("Q".to_string())).await.unwrap();
        assert_eq!(list.count, 0);
    }

    #[tokio::test]
    async fn test_info_handler() {
        let info = info_handler(State(test_state())).await;
        assert_eq!(info.name, "handlers");
        assert_eq!(info.kind, "memory");
        assert_eq!(info.ttl_ms, None);
    }

    #[tokio::test]
    async fn test_info_handler_saturates_huge_ttl() {
        let cache = Cache::new(
            "forever",
            AnyBackend::Memory(MemoryBackend::new()),
            Some(std::time::Duration::MAX),
        );
        let info = info_handler(State(AppState::new(cache))).await;
        assert_eq!(info.ttl_ms, Some(u64::MAX));
    }
}
