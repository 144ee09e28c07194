//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mini_cache::{api::create_router, AnyBackend, AppState, Cache, MemoryBackend};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app(ttl: Option<Duration>) -> Router {
    let cache = Cache::new("api", AnyBackend::Memory(MemoryBackend::new()), ttl);
    create_router(AppState::new(cache))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == Store / Fetch ==

#[tokio::test]
async fn test_store_endpoint_success() {
    let app = create_test_app(None);

    let (status, json) = send(&app, "PUT", "/store/TestType/1", Some(r#"{"a":"Test"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["type"], "TestType");
    assert_eq!(json["id"], "1");
    assert_eq!(json["payload"], json!({"a": "Test"}));
}

#[tokio::test]
async fn test_fetch_endpoint_success() {
    let app = create_test_app(None);
    send(&app, "PUT", "/store/TestType/1", Some(r#"{"a":"Test"}"#)).await;

    let (status, json) = send(&app, "GET", "/fetch/TestType/1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payload"], json!({"a": "Test"}));
}

#[tokio::test]
async fn test_fetch_endpoint_not_found() {
    let app = create_test_app(None);

    let (status, json) = send(&app, "GET", "/fetch/TestType/404", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("TestType/404"));
}

#[tokio::test]
async fn test_store_overwrites() {
    let app = create_test_app(None);
    send(&app, "PUT", "/store/Q/1", Some("1")).await;
    send(&app, "PUT", "/store/Q/1", Some("2")).await;

    let (_, json) = send(&app, "GET", "/fetch/Q/1", None).await;
    assert_eq!(json["payload"], json!(2));
}

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app(None);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/store/Q/1")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == List / Map ==

#[tokio::test]
async fn test_list_and_map_endpoints() {
    let app = create_test_app(None);
    send(&app, "PUT", "/store/Q/1", Some(r#"{"a":1}"#)).await;
    send(&app, "PUT", "/store/Q/2", Some(r#"{"a":2}"#)).await;

    let (status, list) = send(&app, "GET", "/list/Q", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 2);
    let payloads = list["payloads"].as_array().unwrap();
    assert!(payloads.contains(&json!({"a": 1})));
    assert!(payloads.contains(&json!({"a": 2})));

    let (status, map) = send(&app, "GET", "/map/Q", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(map["entries"], json!({"1": {"a": 1}, "2": {"a": 2}}));
}

#[tokio::test]
async fn test_list_unknown_type_is_empty() {
    let app = create_test_app(None);

    let (status, list) = send(&app, "GET", "/list/nowhere", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 0);
}

// == Remove / Clear ==

#[tokio::test]
async fn test_remove_endpoint() {
    let app = create_test_app(None);
    send(&app, "PUT", "/store/Q/1", Some(r#"{"a":1}"#)).await;

    let (status, json) = send(&app, "DELETE", "/remove/Q/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["previous"], json!({"a": 1}));

    let (status, _) = send(&app, "DELETE", "/remove/Q/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_endpoint_is_idempotent() {
    let app = create_test_app(None);
    send(&app, "PUT", "/store/Q/1", Some("1")).await;
    send(&app, "PUT", "/store/Other/1", Some("2")).await;

    let (status, _) = send(&app, "DELETE", "/clear/Q", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", "/clear/Q", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send(&app, "GET", "/list/Q", None).await;
    assert_eq!(list["count"], 0);
    let (status, _) = send(&app, "GET", "/fetch/Other/1", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == Info / Health ==

#[tokio::test]
async fn test_info_endpoint() {
    let app = create_test_app(Some(Duration::from_secs(30)));

    let (status, json) = send(&app, "GET", "/info", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "api");
    assert_eq!(json["type"], "memory");
    assert_eq!(json["ttl_ms"], 30_000);
    assert_eq!(json["pending_expiries"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(None);

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == TTL ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app(Some(Duration::from_millis(300)));
    send(&app, "PUT", "/store/Q/1", Some(r#"{"a":1}"#)).await;

    let (_, info) = send(&app, "GET", "/info", None).await;
    assert_eq!(info["pending_expiries"], 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (status, _) = send(&app, "GET", "/fetch/Q/1", None).await;
    assert_eq!(status, StatusCode::OK, "Fetch before expiry restarts the TTL");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (status, _) = send(&app, "GET", "/fetch/Q/1", None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(450)).await;
    let (status, _) = send(&app, "GET", "/fetch/Q/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
