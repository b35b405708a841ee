//! Domain layer: the gateway's stateful core, independent of HTTP and drivers.
//!
//! # Architecture
//!
//! - [`rate_limiter`] - Per-client fixed-window request counting
//! - [`lifecycle`] - Process phases from startup to shutdown
//! - [`dependency`] - Traits for the durable store and the cache
//!
//! # Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Dependency traits define contracts implemented by [`crate::infrastructure`]
//! - Orchestration lives in [`crate::application`]

pub mod dependency;
pub mod lifecycle;
pub mod rate_limiter;
