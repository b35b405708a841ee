//! Top-level router: built-in health endpoints plus the three mounted route groups.
//!
//! # Route Structure
//!
//! - `*    /health`        - Liveness (built-in, not rate limited)
//! - `GET  /health/ready`  - Readiness: store and cache ping (built-in, not rate limited)
//! - `/`                   - Tracking route group
//! - `/analytics/*`        - Analytics route group
//! - `/campaigns/*`        - Campaigns route group
//!
//! Anything else, including a known path with an unsupported method, is answered
//! with `404 {"error": "Not found"}`.

use axum::Router;
use axum::routing::{any, get};

use crate::api::handlers::{health_handler, not_found_handler, readiness_handler};
use crate::api::pipeline::Pipeline;
use crate::state::AppState;

/// The externally supplied request handlers, one router per mount point.
///
/// Groups receive [`AppState`] and may extract
/// [`ParsedBody`](crate::api::middleware::body::ParsedBody) to read the decoded body.
/// They must not register `/health` or `/health/ready`.
#[derive(Default)]
pub struct RouteGroups {
    /// Mounted at the root.
    pub tracking: Router<AppState>,
    /// Mounted under `/analytics`.
    pub analytics: Router<AppState>,
    /// Mounted under `/campaigns`.
    pub campaigns: Router<AppState>,
}

impl RouteGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracking(mut self, router: Router<AppState>) -> Self {
        self.tracking = router;
        self
    }

    pub fn analytics(mut self, router: Router<AppState>) -> Self {
        self.analytics = router;
        self
    }

    pub fn campaigns(mut self, router: Router<AppState>) -> Self {
        self.campaigns = router;
        self
    }
}

/// Constructs the application router with all routes and the request pipeline.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `groups` - tracking, analytics and campaigns handlers
/// - `pipeline` - the stages every request passes through before dispatch
pub fn app_router(state: AppState, groups: RouteGroups, pipeline: &Pipeline) -> Router {
    let RouteGroups {
        tracking,
        analytics,
        campaigns,
    } = groups;

    let router = Router::new()
        .route("/health", any(health_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(tracking)
        .nest("/analytics", analytics)
        .nest("/campaigns", campaigns)
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
        .with_state(state);

    pipeline.apply(router)
}
