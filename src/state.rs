//! Shared state handed to every handler.

use crate::domain::dependency::Dependencies;
use crate::domain::rate_limiter::RateLimiter;

/// Process-wide handles, cloned into each request.
///
/// Route groups receive the same state; concrete connection types are available through
/// [`Dependencies::store_as`] and [`Dependencies::cache_as`].
#[derive(Clone)]
pub struct AppState {
    pub deps: Dependencies,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(deps: Dependencies, limiter: RateLimiter) -> Self {
        Self { deps, limiter }
    }
}
