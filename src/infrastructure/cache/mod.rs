//! Redis cache/broker connection.
//!
//! The gateway itself only establishes and probes the connection; route groups use the
//! [`RedisCache::manager`] handle for their own commands.

mod redis_cache;

pub use redis_cache::{RedisCache, RedisConnector};
