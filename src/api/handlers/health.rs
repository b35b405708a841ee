//! Handlers for the liveness and readiness endpoints.

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use chrono::{SecondsFormat, Utc};

use crate::api::dto::health::{CheckStatus, HealthResponse, ReadinessChecks, ReadinessResponse};
use crate::domain::dependency::Dependency;
use crate::state::AppState;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Liveness check.
///
/// # Endpoint
///
/// `* /health` (any method)
///
/// # Response
///
/// Always **200 OK**, whatever the state of the limiter or the dependencies:
///
/// ```json
/// { "status": "healthy", "time": "2024-05-01T12:00:00.000Z" }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Readiness check: pings the store and the cache concurrently.
///
/// # Endpoint
///
/// `GET /health/ready`
///
/// # Response Codes
///
/// - **200 OK**: both dependencies answered
/// - **503 Service Unavailable**: at least one did not
///
/// Failure details are logged, never returned.
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let (store, cache) = tokio::join!(
        probe(state.deps.store.as_ref()),
        probe(state.deps.cache.as_ref()),
    );

    let ready = store.is_ok() && cache.is_ok();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        checks: ReadinessChecks { store, cache },
    };

    (status, Json(body))
}

async fn probe(dep: &dyn Dependency) -> CheckStatus {
    match tokio::time::timeout(PROBE_TIMEOUT, dep.ping()).await {
        Ok(Ok(())) => CheckStatus::ok(),
        Ok(Err(e)) => {
            tracing::warn!(dependency = %dep.kind(), error = %e, "Readiness probe failed");
            CheckStatus::unreachable()
        }
        Err(_) => {
            tracing::warn!(dependency = %dep.kind(), "Readiness probe timed out");
            CheckStatus::unreachable()
        }
    }
}
