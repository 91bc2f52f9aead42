//! Integration tests for the health endpoint.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(app.router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["dispatcherRunning"], false);
}

#[tokio::test]
async fn test_health_reports_started_dispatcher() {
    let app = common::build_test_app();
    app.state.dispatcher.start();

    let (_, json) = common::get_json(app.router(), "/health").await;

    assert_eq!(json["dispatcherRunning"], true);
    app.state.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_test_app();

    let (status, _) = common::get_json(app.router(), "/api/v1/nonexistent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
