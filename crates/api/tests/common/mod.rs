#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use herald_api::config::ServerConfig;
use herald_api::router::build_app_router;
use herald_api::state::AppState;
use herald_events::{Engine, EngineConfig, MemoryStore, Stores, Transports};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// The router under test plus handles on what sits behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub engine: Engine,
}

/// Build the full application router over an in-memory store.
///
/// Uses the same middleware stack as `main.rs`. Broadcasts need Postgres
/// and are left unconfigured.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        Stores::from_shared(Arc::clone(&store)),
        Transports::new(),
        EngineConfig::default(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        events: Arc::clone(&engine.stores.events),
        intake: engine.intake.clone(),
        status: Arc::clone(&engine.status),
        broadcasts: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        engine,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
