//! HTTP layer: the request pipeline, built-in handlers, and response DTOs.
//!
//! # Modules
//!
//! - [`pipeline`] - Ordered stage list applied to every request
//! - [`middleware`] - One module per pipeline stage plus the error boundary
//! - [`handlers`] - Health, readiness and not-found handlers
//! - [`dto`] - Response bodies

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
