//! The fixed, ordered request pipeline.
//!
//! Every request passes through the stages in [`STANDARD_STAGES`] order:
//!
//! 1. [`Stage::SecurityHeaders`] - hardening headers on every response
//! 2. [`Stage::Cors`] - CORS policy; preflight requests stop here
//! 3. [`Stage::BodyDecoding`] - JSON and URL-encoded bodies into [`ParsedBody`]
//! 4. [`Stage::RateLimit`] - per-client window check
//!
//! A stage either passes the request on or answers it itself; nothing is reordered.
//! Around the stages sit the request tracing span (outermost) and the error boundary
//! (directly beneath the security headers, so its responses are hardened too).
//!
//! [`ParsedBody`]: crate::api::middleware::body::ParsedBody

use axum::{Router, middleware};

use crate::api::middleware::{
    body::{self, BodyLimit},
    cors, error_boundary,
    rate_limit::{self, RateLimitState},
    security_headers, tracing,
};
use crate::config::Config;
use crate::domain::rate_limiter::RateLimiter;

/// One unit of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SecurityHeaders,
    Cors,
    BodyDecoding,
    RateLimit,
}

/// The order every request passes through.
pub const STANDARD_STAGES: [Stage; 4] = [
    Stage::SecurityHeaders,
    Stage::Cors,
    Stage::BodyDecoding,
    Stage::RateLimit,
];

/// Paths that never count against the rate limit.
pub const LIMIT_EXEMPT_PATHS: [&str; 2] = ["/health", "/health/ready"];

/// Inputs the stages need.
#[derive(Clone)]
pub struct PipelineSettings {
    pub limiter: RateLimiter,
    pub behind_proxy: bool,
    pub cors_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config, limiter: RateLimiter) -> Self {
        Self {
            limiter,
            behind_proxy: config.behind_proxy,
            cors_origins: config.cors_origins.clone(),
            body_limit_bytes: config.body_limit_bytes,
        }
    }
}

pub struct Pipeline {
    stages: Vec<Stage>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            stages: STANDARD_STAGES.to_vec(),
            settings,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Wraps `router` so that requests traverse the stages in order.
    ///
    /// Layers added later run earlier, so the stages are applied in reverse.
    pub fn apply(&self, router: Router) -> Router {
        let mut router = router.layer(middleware::from_fn(body::surface_rejection));

        for stage in self.stages.iter().rev() {
            if *stage == Stage::SecurityHeaders {
                router = error_boundary::wrap(router);
            }
            router = self.layer_stage(*stage, router);
        }

        router.layer(tracing::layer())
    }

    fn layer_stage(&self, stage: Stage, router: Router) -> Router {
        let settings = &self.settings;
        match stage {
            Stage::SecurityHeaders => router.layer(middleware::from_fn(security_headers::layer)),
            Stage::Cors => router.layer(cors::layer(&settings.cors_origins)),
            Stage::BodyDecoding => router.layer(middleware::from_fn_with_state(
                BodyLimit(settings.body_limit_bytes),
                body::layer,
            )),
            Stage::RateLimit => {
                let state = RateLimitState::new(settings.limiter.clone(), settings.behind_proxy)
                    .with_exempt_paths(LIMIT_EXEMPT_PATHS);
                router.layer(middleware::from_fn_with_state(state, rate_limit::layer))
            }
        }
    }
}
