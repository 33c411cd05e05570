//! HTTP handlers for the reservations API.
//!
//! Implements:
//! - GET /reservations - Current document, `[]` on any failure
//! - POST /reservations - Replace the document
//! - OPTIONS /reservations - CORS pre-flight
//! - GET /health - Health check endpoint

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use reservations_core::DocumentStore;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentStore,
}

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub backend: &'static str,
    pub document_key: String,
}

/// Build the router. Every response carries permissive CORS headers.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let reservations = get(read_reservations)
        .post(write_reservations)
        .options(preflight)
        .fallback(method_not_allowed);

    Router::new()
        .route("/health", get(health_handler))
        .route("/reservations", reservations.clone())
        .route("/api/reservations", reservations)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,POST,OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        backend: state.documents.backend_name(),
        document_key: state.documents.key().to_string(),
    })
}

/// GET /reservations - Always 200; storage and decode failures read as `[]`.
pub async fn read_reservations(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.documents.read_or_empty().await)
}

/// POST /reservations - Replace the whole document.
///
/// The body may be a JSON value or a JSON string holding JSON text.
/// Non-array payloads are stored as `[]`; unparseable ones are rejected
/// without touching the store. A failed `put` answers 502 with the same
/// `{ok: false, error}` body as a rejected payload, rather than reusing the
/// 400 "Invalid JSON" reply, so clients can tell a bad payload from an
/// unreachable store.
pub async fn write_reservations(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let payload = parse_payload(&body).inspect_err(|e| {
        warn!("Rejected reservation write ({} bytes): {}", body.len(), e);
    })?;

    let entry = state
        .documents
        .write(payload)
        .await
        .inspect_err(|e| warn!("Failed to store reservations: {}", e))?;

    debug!("Stored reservations at {} ({} bytes)", entry.pathname, entry.size_bytes);
    Ok(Json(json!({ "ok": true })))
}

/// OPTIONS /reservations - Empty pre-flight response.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn parse_payload(body: &[u8]) -> std::result::Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(body)? {
        Value::String(text) => serde_json::from_str(&text),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderMap, Method, Request};
    use reservations_core::{BlobEntry, BlobStore, MemoryBlobStore, PutOptions, StorageError};
    use tower::ServiceExt;

    use super::*;

    const KEY: &str = "reservations.json";

    fn setup() -> (Arc<MemoryBlobStore>, Router) {
        let store = Arc::new(MemoryBlobStore::new());
        let state = AppState {
            documents: DocumentStore::new(store.clone(), KEY),
        };
        (store, router(state, 1024 * 1024))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: impl Into<Body>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    /// Every call fails, like a blob store that cannot be reached.
    struct UnreachableStore;

    #[async_trait]
    impl BlobStore for UnreachableStore {
        fn backend_name(&self) -> &'static str {
            "unreachable"
        }

        async fn put(
            &self,
            _name: &str,
            _content: Vec<u8>,
            _options: &PutOptions,
        ) -> std::result::Result<BlobEntry, StorageError> {
            Err(StorageError::Io("connection refused".to_string()))
        }

        async fn list(
            &self,
            _prefix: &str,
            _limit: Option<usize>,
        ) -> std::result::Result<Vec<BlobEntry>, StorageError> {
            Err(StorageError::Io("connection refused".to_string()))
        }

        async fn fetch(&self, _entry: &BlobEntry) -> std::result::Result<Vec<u8>, StorageError> {
            Err(StorageError::Io("connection refused".to_string()))
        }
    }

    fn unreachable_app() -> Router {
        let state = AppState {
            documents: DocumentStore::new(Arc::new(UnreachableStore), KEY),
        };
        router(state, 1024 * 1024)
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET,POST,OPTIONS");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn test_read_without_document() {
        let (_store, app) = setup();
        let (status, headers, body) = send(&app, Method::GET, "/reservations", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!([]));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn test_read_corrupt_document() {
        let (store, app) = setup();
        store.insert_raw(KEY, "{{{ definitely not json");

        let (status, _, body) = send(&app, Method::GET, "/reservations", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!([]));
    }

    #[tokio::test]
    async fn test_read_non_array_document() {
        let (store, app) = setup();
        store.insert_raw(KEY, r#"{"id":"a"}"#);

        let (status, _, body) = send(&app, Method::GET, "/reservations", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!([]));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (store, app) = setup();
        let document = r#"[{"id":"a","tableNumber":3,"reservedBy":"Ana","date":"2025-01-01T20:00:00Z","seats":["Marko"]}]"#;

        let (status, headers, body) = send(&app, Method::POST, "/reservations", document).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "ok": true }));
        assert_cors(&headers);

        let (status, _, body) = send(&app, Method::GET, "/reservations", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), serde_json::from_str::<Value>(document).unwrap());

        assert_eq!(store.content_type(KEY).unwrap(), "application/json; charset=utf-8");
    }

    #[tokio::test]
    async fn test_repeated_write_reads_the_same() {
        let (_store, app) = setup();
        let document = r#"[{"id":"a","tableNumber":1,"reservedBy":"Ana","date":"x","seats":[]}]"#;

        send(&app, Method::POST, "/reservations", document).await;
        let (_, _, first) = send(&app, Method::GET, "/reservations", Body::empty()).await;
        send(&app, Method::POST, "/reservations", document).await;
        let (_, _, second) = send(&app, Method::GET, "/reservations", Body::empty()).await;

        assert_eq!(json_body(&first), json_body(&second));
    }

    #[tokio::test]
    async fn test_write_rejects_invalid_json() {
        let (store, app) = setup();
        store.insert_raw(KEY, "[1]");

        let (status, headers, body) = send(&app, Method::POST, "/reservations", "not json{").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body), json!({ "ok": false, "error": "Invalid JSON" }));
        assert_cors(&headers);

        assert_eq!(store.put_count(), 0);
        assert_eq!(store.contents(KEY).unwrap(), b"[1]");
    }

    #[tokio::test]
    async fn test_write_rejects_invalid_json_text() {
        let (store, app) = setup();

        let (status, _, body) =
            send(&app, Method::POST, "/reservations", r#""not json{""#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body), json!({ "ok": false, "error": "Invalid JSON" }));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_write_accepts_json_text() {
        let (store, app) = setup();

        let (status, _, _) =
            send(&app, Method::POST, "/reservations", r#""[{\"id\":\"a\"}]""#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<Value>(&store.contents(KEY).unwrap()).unwrap(),
            json!([{ "id": "a" }])
        );
    }

    #[tokio::test]
    async fn test_write_null_stores_empty_array() {
        let (store, app) = setup();
        store.insert_raw(KEY, "[1, 2, 3]");

        let (status, _, _) = send(&app, Method::POST, "/reservations", "null").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.contents(KEY).unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_write_empty_body_stores_empty_array() {
        let (store, app) = setup();

        let (status, _, _) = send(&app, Method::POST, "/reservations", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.contents(KEY).unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_write_storage_unavailable() {
        let app = unreachable_app();
        let document = r#"[{"id":"a","tableNumber":3}]"#;

        let (status, headers, body) = send(&app, Method::POST, "/reservations", document).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            json_body(&body),
            json!({ "ok": false, "error": "Storage unavailable" })
        );
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn test_read_storage_unavailable() {
        let app = unreachable_app();

        let (status, headers, body) = send(&app, Method::GET, "/reservations", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!([]));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn test_preflight() {
        let (_store, app) = setup();
        let (status, headers, body) =
            send(&app, Method::OPTIONS, "/reservations", Body::empty()).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn test_other_verbs_not_allowed() {
        let (store, app) = setup();

        for method in [Method::PUT, Method::DELETE, Method::PATCH] {
            let (status, headers, body) = send(&app, method, "/reservations", "[]").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(json_body(&body), json!({ "error": "Method not allowed" }));
            assert_cors(&headers);
        }
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_api_alias() {
        let (_store, app) = setup();
        send(&app, Method::POST, "/api/reservations", r#"[{"id":"z"}]"#).await;

        let (_, _, body) = send(&app, Method::GET, "/reservations", Body::empty()).await;
        assert_eq!(json_body(&body), json!([{ "id": "z" }]));
    }

    #[tokio::test]
    async fn test_health() {
        let (_store, app) = setup();
        let (status, _, body) = send(&app, Method::GET, "/health", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["backend"], "memory");
        assert_eq!(body["documentKey"], KEY);
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(b"  \n").unwrap(), Value::Null);
        assert_eq!(parse_payload(b"[1]").unwrap(), json!([1]));
        assert_eq!(parse_payload(br#""[1]""#).unwrap(), json!([1]));
        assert_eq!(parse_payload(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(parse_payload(b"not json{").is_err());
    }
}
