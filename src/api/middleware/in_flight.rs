//! In-flight request accounting for graceful shutdown.
//!
//! axum runs each connection on its own task, so the server future finishing (or
//! being abandoned after the grace period) says nothing about handlers still running.
//! [`RequestTracker`] counts requests between entry and response. Shutdown waits on
//! [`RequestTracker::idle`] before releasing dependencies, and once the grace period is
//! over [`RequestTracker::cancel`] ends every outstanding request with `503`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::watch;

use crate::api::middleware::security_headers;
use crate::error::AppError;

struct TrackerInner {
    active: watch::Sender<usize>,
    cancel: watch::Sender<bool>,
}

/// Shared counter of requests currently being handled.
#[derive(Clone)]
pub struct RequestTracker {
    inner: Arc<TrackerInner>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                active: watch::Sender::new(0),
                cancel: watch::Sender::new(false),
            }),
        }
    }

    /// Number of requests that have entered and not yet completed.
    pub fn active(&self) -> usize {
        *self.inner.active.borrow()
    }

    /// Registers a request; it counts as active until the guard drops.
    pub fn enter(&self) -> InFlightGuard {
        self.inner.active.send_modify(|n| *n += 1);
        InFlightGuard {
            tracker: self.clone(),
        }
    }

    /// Resolves once no request is active.
    pub async fn idle(&self) {
        let mut rx = self.inner.active.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Ends every active request, and any that enters afterwards, with `503`.
    pub fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.inner.cancel.subscribe();
        let _ = rx.wait_for(|c| *c).await;
    }
}

/// Decrements the active count on drop.
pub struct InFlightGuard {
    tracker: RequestTracker,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker
            .inner
            .active
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Tracking middleware. Wraps the whole stack so the count covers every stage.
pub async fn layer(State(tracker): State<RequestTracker>, req: Request, next: Next) -> Response {
    let _guard = tracker.enter();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    tokio::select! {
        response = next.run(req) => response,
        _ = tracker.cancelled() => {
            tracing::warn!(%method, path = %path, "Request cancelled by shutdown");
            let mut response = AppError::ShuttingDown.into_response();
            security_headers::harden(response.headers_mut());
            response
        }
    }
}
