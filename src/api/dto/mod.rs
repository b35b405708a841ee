//! Response bodies for the built-in endpoints.

pub mod health;
