//! Integration tests for organization commands.

mod common;

use axum::http::StatusCode;
use crm_core::command::BaseCommand;
use crm_organization::application::command_handlers::handle_create_organization;
use crm_organization::application::owner_notification::owner_notification_delay;
use crm_organization::domain::commands::CreateOrganization;
use crm_organization::domain::events::{
    ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1, OrganizationDetails,
};

async fn create_organization(app: &common::TestApp) {
    let command = CreateOrganization {
        base: BaseCommand::new("acme", "org-1"),
        details: OrganizationDetails {
            name: "Initech".into(),
            ..OrganizationDetails::default()
        },
        ..CreateOrganization::default()
    };
    handle_create_organization(&command, &app.state.handler)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_owner_update_commits_projects_and_buffers_notification() {
    // Arrange
    let app = common::build_test_app();
    create_organization(&app).await;

    // Act
    let (status, json) = common::send_json(
        app.router(),
        "PUT",
        "/api/v1/organizations/acme/org-1/owner",
        &serde_json::json!({"ownerUserId": "u-9", "loggedInUserId": "u-admin"}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["aggregateId"], "org-1");
    assert_eq!(json["events"], 1);

    let (status, record) =
        common::get_json(app.router(), "/api/v1/read-models/organization/acme/org-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["aggregateVersion"], 2);
    assert_eq!(record["state"]["ownerUserId"], "u-9");

    let entries = app.buffer.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1);
    assert_eq!(entries[0].expires_at, app.clock.0 + owner_notification_delay());
}

#[tokio::test]
async fn test_owner_update_without_owner_returns_400() {
    let app = common::build_test_app();
    create_organization(&app).await;

    let (status, json) = common::send_json(
        app.router(),
        "PUT",
        "/api/v1/organizations/acme/org-1/owner",
        &serde_json::json!({"ownerUserId": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(app.buffer.entries().await.is_empty());
}

#[tokio::test]
async fn test_owner_update_on_missing_organization_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::send_json(
        app.router(),
        "PUT",
        "/api/v1/organizations/acme/org-404/owner",
        &serde_json::json!({"ownerUserId": "u-9"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "aggregate_not_found");
}
