//! Built-in HTTP handlers.
//!
//! Everything else is served by the externally supplied route groups.

pub mod fallback;
pub mod health;

pub use fallback::not_found_handler;
pub use health::{health_handler, readiness_handler};
