//! Redis-backed cache/broker handle.

use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, info};

use crate::config::mask_connection_string;
use crate::domain::dependency::{Connector, Dependency, DependencyError, DependencyKind};

/// Opens a [`RedisCache`] from a connection URL.
pub struct RedisConnector {
    redis_url: String,
}

impl RedisConnector {
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
        }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    fn kind(&self) -> DependencyKind {
        DependencyKind::Cache
    }

    async fn connect(&self) -> Result<Arc<dyn Dependency>, DependencyError> {
        Ok(Arc::new(RedisCache::connect(&self.redis_url).await?))
    }
}

/// Live Redis connection.
///
/// Uses `ConnectionManager`, which reconnects transparently after the initial handshake.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Connect`] if the URL is invalid, the connection cannot
    /// be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> Result<Self, DependencyError> {
        info!("Connecting to Redis at {}", mask_connection_string(redis_url));

        let client = Client::open(redis_url).map_err(|e| {
            DependencyError::connect(
                DependencyKind::Cache,
                format!("Failed to create Redis client: {}", e),
            )
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            DependencyError::connect(
                DependencyKind::Cache,
                format!("Failed to connect to Redis: {}", e),
            )
        })?;

        let cache = Self { manager };
        cache.ping().await.map_err(|e| {
            DependencyError::connect(DependencyKind::Cache, e.to_string())
        })?;

        Ok(cache)
    }

    /// Shared connection handle for route groups.
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl Dependency for RedisCache {
    fn kind(&self) -> DependencyKind {
        DependencyKind::Cache
    }

    async fn ping(&self) -> Result<(), DependencyError> {
        let mut conn = self.manager.clone();
        conn.ping::<()>()
            .await
            .map_err(|e| DependencyError::probe(DependencyKind::Cache, format!("Redis PING failed: {}", e)))
    }

    async fn close(&self) {
        // ConnectionManager has no explicit close; the socket goes away with the last clone.
        debug!("Redis connection released");
    }
}
