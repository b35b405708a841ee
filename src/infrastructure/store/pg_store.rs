//! PostgreSQL connection pool handle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::{Config, mask_connection_string};
use crate::domain::dependency::{Connector, Dependency, DependencyError, DependencyKind};

/// Opens a [`PgStore`] with the configured pool settings.
pub struct PgConnector {
    database_url: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            database_url: config.database_url.clone(),
            max_connections: config.db_max_connections,
            acquire_timeout: Duration::from_secs(config.db_connect_timeout),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    fn kind(&self) -> DependencyKind {
        DependencyKind::Store
    }

    async fn connect(&self) -> Result<Arc<dyn Dependency>, DependencyError> {
        info!(
            "Connecting to database at {}",
            mask_connection_string(&self.database_url)
        );

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await
            .map_err(|e| DependencyError::connect(DependencyKind::Store, e.to_string()))?;

        Ok(Arc::new(PgStore::new(pool)))
    }
}

/// Live PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Shared pool for route groups.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Dependency for PgStore {
    fn kind(&self) -> DependencyKind {
        DependencyKind::Store
    }

    async fn ping(&self) -> Result<(), DependencyError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| DependencyError::probe(DependencyKind::Store, e.to_string()))
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
