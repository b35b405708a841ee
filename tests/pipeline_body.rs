mod common;

use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    http::{HeaderName, HeaderValue, StatusCode},
    routing::post,
};
use axum_test::TestServer;
use serde_json::json;
use tracker_gateway::domain::rate_limiter::RateLimiter;
use tracker_gateway::routes::RouteGroups;
use tracker_gateway::state::AppState;

fn server(limit: u64) -> TestServer {
    TestServer::new(common::limited_app(limit, Duration::from_secs(60))).unwrap()
}

#[tokio::test]
async fn test_json_body_reaches_route_group() {
    let server = server(100);

    let response = server
        .post("/track")
        .json(&json!({ "event": "open", "campaign": 7 }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "kind": "json",
        "value": { "event": "open", "campaign": 7 }
    }));
}

#[tokio::test]
async fn test_form_body_reaches_route_group() {
    let server = server(100);

    let response = server
        .post("/track")
        .bytes(Bytes::from_static(b"event=click&tag=a&tag=b&note=hello+world"))
        .content_type("application/x-www-form-urlencoded")
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "kind": "form",
        "value": { "event": "click", "tag": ["a", "b"], "note": "hello world" }
    }));
}

#[tokio::test]
async fn test_missing_body_is_empty() {
    let server = server(100);

    let response = server.post("/track").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "kind": "empty" }));
}

#[tokio::test]
async fn test_other_content_type_is_left_alone() {
    let tracking: Router<AppState> =
        Router::new().route("/raw", post(|body: String| async move { body }));
    let app = common::build_app(
        RouteGroups::new().tracking(tracking),
        common::settings(RateLimiter::new(100, Duration::from_secs(60))),
    );
    let server = TestServer::new(app).unwrap();

    let response = server.post("/raw").text("plain payload").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "plain payload");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = server(100);

    let response = server
        .post("/track")
        .bytes(Bytes::from_static(b"{\"event\": "))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), r#"{"error":"Invalid request body"}"#);
}

#[tokio::test]
async fn test_scalar_json_is_bad_request() {
    let server = server(100);

    let response = server
        .post("/track")
        .bytes(Bytes::from_static(b"42"))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_counts_against_limit() {
    let server = server(2);

    let response = server
        .post("/track")
        .bytes(Bytes::from_static(b"not json"))
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.header("x-ratelimit-remaining"), "1");

    server.get("/track").await.assert_status_ok();
    server
        .get("/track")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_wins_over_malformed_body() {
    let server = server(1);

    server.get("/track").await.assert_status_ok();

    let response = server
        .post("/track")
        .bytes(Bytes::from_static(b"{broken"))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = server(100);
    let payload = format!(r#"{{"blob":"{}"}}"#, "x".repeat(4096));

    let response = server
        .post("/track")
        .bytes(Bytes::from(payload))
        .content_type("application/json")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("198.51.100.4"),
        )
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.text(), r#"{"error":"Request body too large"}"#);
}
