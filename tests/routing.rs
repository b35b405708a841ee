mod common;

use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::get};
use axum_test::TestServer;
use serde_json::json;
use tracker_gateway::AppError;
use tracker_gateway::domain::rate_limiter::RateLimiter;
use tracker_gateway::routes::RouteGroups;
use tracker_gateway::state::AppState;

async fn explode() -> &'static str {
    panic!("boom")
}

fn groups() -> RouteGroups {
    let analytics: Router<AppState> = Router::new()
        .route("/summary", get(|| async { Json(json!({ "group": "analytics" })) }))
        .route(
            "/broken",
            get(|| async {
                Err::<(), _>(AppError::internal(
                    "relation \"events\" does not exist at postgres://admin:pw@db",
                ))
            }),
        );

    let campaigns: Router<AppState> = Router::new()
        .route("/{id}", get(|| async { Json(json!({ "group": "campaigns" })) }))
        .route("/explode/now", get(explode));

    RouteGroups::new()
        .tracking(common::tracking_routes())
        .analytics(analytics)
        .campaigns(campaigns)
}

fn server() -> TestServer {
    let app = common::build_app(
        groups(),
        common::settings(RateLimiter::new(100, Duration::from_secs(60))),
    );
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let response = server().get("/does-not-exist").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), r#"{"error":"Not found"}"#);
    assert_eq!(response.header("content-type"), "application/json");
}

#[tokio::test]
async fn test_wrong_method_is_not_found() {
    let response = server().delete("/pixel").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), r#"{"error":"Not found"}"#);
}

#[tokio::test]
async fn test_tracking_group_at_root() {
    let response = server().get("/pixel").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "pixel");
}

#[tokio::test]
async fn test_analytics_group_is_nested() {
    let server = server();

    let response = server.get("/analytics/summary").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "group": "analytics" }));

    server
        .get("/summary")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_campaigns_group_is_nested() {
    let response = server().get("/campaigns/42").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "group": "campaigns" }));
}

#[tokio::test]
async fn test_unknown_path_under_group_is_not_found() {
    let response = server().get("/analytics/nope").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), r#"{"error":"Not found"}"#);
}

#[tokio::test]
async fn test_group_error_is_generic() {
    let response = server().get("/analytics/broken").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), r#"{"error":"Internal server error"}"#);
}

#[tokio::test]
async fn test_group_panic_is_generic() {
    let response = server().get("/campaigns/explode/now").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), r#"{"error":"Internal server error"}"#);
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}
