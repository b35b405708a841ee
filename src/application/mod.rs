//! Application layer services orchestrating the domain.
//!
//! # Available Services
//!
//! - [`sequencer::Sequencer`] - Dependency-gated startup and ordered shutdown
//! - [`sweeper`] - Background eviction of expired rate-limit windows

pub mod sequencer;
pub mod sweeper;
