//! PostgreSQL durable store connection.

mod pg_store;

pub use pg_store::{PgConnector, PgStore};
