//! Infrastructure layer for external integrations.
//!
//! Concrete implementations of [`crate::domain::dependency`] traits.
//!
//! # Modules
//!
//! - [`store`] - PostgreSQL durable store
//! - [`cache`] - Redis cache/broker

pub mod cache;
pub mod store;
