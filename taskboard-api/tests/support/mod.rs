//! Helpers for driving the full router in integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use taskboard_api::{create_router, issue_token_pair, ApiConfig, AppState, AuthConfig};
use taskboard_core::User;
use taskboard_storage::{MemoryStore, Store};
use tempfile::TempDir;
use tower::ServiceExt;

/// A router over `store` plus the state behind it. Keep `_uploads` alive for
/// the duration of the test.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    pub _uploads: TempDir,
}

pub fn test_config(uploads: &TempDir) -> ApiConfig {
    ApiConfig {
        rate_limit_enabled: false,
        upload_dir: uploads.path().to_path_buf(),
        ..ApiConfig::default()
    }
}

pub fn test_app(store: MemoryStore) -> TestApp {
    let uploads = TempDir::new().expect("temp upload dir");
    let config = test_config(&uploads);
    test_app_with_config(store, config, uploads)
}

pub fn test_app_with_config(store: MemoryStore, config: ApiConfig, uploads: TempDir) -> TestApp {
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let state = AppState::new(shared, AuthConfig::default(), config);
    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        _uploads: uploads,
    }
}

impl TestApp {
    /// Access token for `user`, signed with the app's secret.
    pub fn token_for(&self, user: &User) -> String {
        issue_token_pair(&self.state.auth, user.id, user.role)
            .expect("token issuance")
            .access_token
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(json_request(Method::GET, uri, None, token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, uri, Some(body), token))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(json_request(Method::PUT, uri, Some(body), token))
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(json_request(Method::DELETE, uri, None, token))
            .await
    }

    /// POST a GraphQL document; returns the decoded response body.
    pub async fn graphql(&self, query: &str, token: Option<&str>) -> Value {
        let (status, body) = self
            .post("/graphql", serde_json::json!({ "query": query }), token)
            .await;
        assert_eq!(status, StatusCode::OK, "GraphQL transport error: {}", body);
        body
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request")
}

pub const BOUNDARY: &str = "taskboard-test-boundary";

/// A multipart/form-data request carrying one file part.
pub fn multipart_request(
    uri: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    contents: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("valid request")
}
