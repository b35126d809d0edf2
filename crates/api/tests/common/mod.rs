#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rftm_core::runner::SimulatedRunner;
use rftm_db::MemoryStore;
use rftm_storage::{LocalArtifactStore, StorageConfig};
use serde_json::Value;
use tower::ServiceExt;

use rftm_api::config::ServerConfig;
use rftm_api::router::build_app_router;
use rftm_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Small page sizes keep pagination tests short.
pub fn test_config(artifact_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        default_page_size: 5,
        max_page_size: 10,
        storage: StorageConfig::local(artifact_root),
    }
}

/// The application under test plus handles on its backing stores.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub artifacts: Arc<LocalArtifactStore>,
    _dir: tempfile::TempDir,
}

/// Build the full application router over an in-memory store and an
/// on-disk artifact store in a temporary directory.
///
/// Uses [`build_app_router`] so tests exercise the same middleware stack
/// (CORS, request ID, timeout, tracing, panic recovery) as production.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let artifacts = Arc::new(LocalArtifactStore::new(dir.path()));

    let state = AppState::new(
        store.clone(),
        artifacts.clone(),
        Arc::new(SimulatedRunner::passing()),
        test_config(dir.path()),
    );

    TestApp {
        router: build_app_router(state),
        store,
        artifacts,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        send(self.router.clone(), Method::GET, uri, None).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        send(self.router.clone(), Method::POST, uri, Some(body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> Response<Body> {
        send(self.router.clone(), Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        send(self.router.clone(), Method::DELETE, uri, None).await
    }

    /// Create a script through the API and return its id.
    pub async fn create_script(&self, name: &str) -> i64 {
        let response = self
            .post_json(
                "/api/v1/tests",
                serde_json::json!({
                    "name": name,
                    "content": "*** Test Cases ***\nSmoke\n    Log    hello",
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["id"].as_i64().unwrap()
    }

    /// Create a case under `script_id` through the API and return its id.
    pub async fn create_case(&self, script_id: i64, name: &str) -> i64 {
        let response = self
            .post_json(
                "/api/v1/cases",
                serde_json::json!({ "test_script_id": script_id, "name": name }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["id"].as_i64().unwrap()
    }
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
