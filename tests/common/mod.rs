use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use chatrelay::config::StoreConfig;
use chatrelay::conversation::ConversationStore;
use chatrelay::providers::fake::{FakeProvider, Script};
use chatrelay::server::{router, AppState};

#[allow(dead_code)]
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Router wired to a scripted provider, with handles to inspect both sides
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub provider: Arc<FakeProvider>,
    pub store: Arc<ConversationStore>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new(script: Script) -> Self {
        let provider = Arc::new(FakeProvider::new(script));
        let store = Arc::new(ConversationStore::new(&StoreConfig::default()));
        let state = AppState::new(store.clone(), provider.clone());
        Self {
            router: router(state, BODY_LIMIT),
            provider,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        (status, body.to_vec())
    }

    pub async fn post_chat(&self, body: Value) -> (StatusCode, Vec<u8>) {
        self.send(json_request("POST", "/api/v1/chat", body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
    }
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

#[allow(dead_code)]
pub fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("body is not JSON")
}

/// JSON payloads of every `data:` line in an event-stream body
#[allow(dead_code)]
pub fn sse_events(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("event is not JSON"))
        .collect()
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
