//! Shared test helpers for worker API tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use crm_event_store::memory::{InMemoryEventBufferRepository, InMemoryEventRepository};
use crm_test_support::FixedClock;
use http_body_util::BodyExt;
use tower::ServiceExt;

use crm_worker::config::WorkerConfig;
use crm_worker::routes;
use crm_worker::state::AppState;

/// A worker wired over in-memory repositories and a fixed clock.
pub struct TestApp {
    pub state: AppState,
    pub events: Arc<InMemoryEventRepository>,
    pub buffer: Arc<InMemoryEventBufferRepository>,
    pub clock: FixedClock,
}

impl TestApp {
    /// The full router, with the same route structure as `main.rs`.
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }
}

pub fn build_test_app() -> TestApp {
    wire(
        Arc::new(InMemoryEventRepository::new()),
        Arc::new(InMemoryEventBufferRepository::new()),
    )
}

/// A fresh worker over the same repositories, as after a process restart:
/// the read store starts empty.
pub fn restart(app: &TestApp) -> TestApp {
    wire(app.events.clone(), app.buffer.clone())
}

fn wire(
    events: Arc<InMemoryEventRepository>,
    buffer: Arc<InMemoryEventBufferRepository>,
) -> TestApp {
    let clock = FixedClock::default_instant();
    let config = WorkerConfig {
        database_url: "postgres://unused".to_owned(),
        ..WorkerConfig::default()
    };
    let state = AppState::new(events.clone(), buffer.clone(), Arc::new(clock), &config);
    TestApp {
        state,
        events,
        buffer,
        clock,
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };
    (status, json)
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
