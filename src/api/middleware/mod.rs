//! Middleware implementing the pipeline stages.
//!
//! Each module exposes the layer for one [`crate::api::pipeline::Stage`]; the error
//! boundary wraps every stage after the security headers.

pub mod body;
pub mod cors;
pub mod error_boundary;
pub mod in_flight;
pub mod rate_limit;
pub mod security_headers;
pub mod tracing;
