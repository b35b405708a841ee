#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracker_gateway::api::middleware::body::ParsedBody;
use tracker_gateway::api::pipeline::{Pipeline, PipelineSettings};
use tracker_gateway::domain::dependency::{
    Connector, Dependencies, Dependency, DependencyError, DependencyKind,
};
use tracker_gateway::domain::rate_limiter::RateLimiter;
use tracker_gateway::routes::{RouteGroups, app_router};
use tracker_gateway::state::AppState;

/// Shared record of connector and dependency calls, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub struct FakeDependency {
    kind: DependencyKind,
    healthy: AtomicBool,
    log: CallLog,
}

impl FakeDependency {
    pub fn new(kind: DependencyKind, log: CallLog) -> Self {
        Self {
            kind,
            healthy: AtomicBool::new(true),
            log,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Dependency for FakeDependency {
    fn kind(&self) -> DependencyKind {
        self.kind
    }

    async fn ping(&self) -> Result<(), DependencyError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DependencyError::probe(self.kind, "connection refused"))
        }
    }

    async fn close(&self) {
        self.log.lock().unwrap().push(format!("close {}", self.kind));
    }
}

pub struct FakeConnector {
    kind: DependencyKind,
    fail: bool,
    log: CallLog,
}

impl FakeConnector {
    pub fn healthy(kind: DependencyKind, log: &CallLog) -> Self {
        Self {
            kind,
            fail: false,
            log: log.clone(),
        }
    }

    pub fn failing(kind: DependencyKind, log: &CallLog) -> Self {
        Self {
            kind,
            fail: true,
            log: log.clone(),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn kind(&self) -> DependencyKind {
        self.kind
    }

    async fn connect(&self) -> Result<Arc<dyn Dependency>, DependencyError> {
        self.log.lock().unwrap().push(format!("connect {}", self.kind));
        if self.fail {
            return Err(DependencyError::connect(self.kind, "connection refused"));
        }
        Ok(Arc::new(FakeDependency::new(self.kind, self.log.clone())))
    }
}

pub fn fake_dependencies() -> (Dependencies, Arc<FakeDependency>, Arc<FakeDependency>) {
    let log = call_log();
    let store = Arc::new(FakeDependency::new(DependencyKind::Store, log.clone()));
    let cache = Arc::new(FakeDependency::new(DependencyKind::Cache, log));
    let deps = Dependencies {
        store: store.clone(),
        cache: cache.clone(),
    };
    (deps, store, cache)
}

pub fn settings(limiter: RateLimiter) -> PipelineSettings {
    PipelineSettings {
        limiter,
        behind_proxy: true,
        cors_origins: Vec::new(),
        body_limit_bytes: 1024,
    }
}

/// Echoes back what the body decoding stage produced.
async fn echo(body: ParsedBody) -> Json<Value> {
    Json(match body {
        ParsedBody::Empty => json!({ "kind": "empty" }),
        ParsedBody::Json(value) => json!({ "kind": "json", "value": value }),
        ParsedBody::Form(fields) => json!({ "kind": "form", "value": fields }),
        ParsedBody::Undecoded => json!({ "kind": "undecoded" }),
    })
}

pub fn tracking_routes() -> Router<AppState> {
    Router::new()
        .route("/track", post(echo).get(|| async { "tracked" }))
        .route("/pixel", get(|| async { "pixel" }))
}

pub fn build_app(groups: RouteGroups, settings: PipelineSettings) -> Router {
    let (deps, _, _) = fake_dependencies();
    let state = AppState::new(deps, settings.limiter.clone());
    app_router(state, groups, &Pipeline::new(settings))
}

/// Tracking routes behind a limiter allowing `limit` requests per `window`.
pub fn limited_app(limit: u64, window: Duration) -> Router {
    build_app(
        RouteGroups::new().tracking(tracking_routes()),
        settings(RateLimiter::new(limit, window)),
    )
}
