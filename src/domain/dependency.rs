//! Traits for the external services the gateway depends on.
//!
//! A [`Connector`] knows how to establish one dependency; the resulting [`Dependency`]
//! handle is held for the life of the process and released on shutdown.
//!
//! # Implementations
//!
//! - [`crate::infrastructure::store::PgConnector`] - PostgreSQL durable store
//! - [`crate::infrastructure::cache::RedisConnector`] - Redis cache/broker
//! - Test mocks available with `cfg(test)`

use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Which external service a dependency represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Store,
    Cache,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Cache => write!(f, "cache"),
        }
    }
}

/// Errors raised while connecting to or probing a dependency.
///
/// Messages are meant for server-side logs only; they may contain hostnames.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("{kind} connection failed: {message}")]
    Connect {
        kind: DependencyKind,
        message: String,
    },

    #[error("{kind} health probe failed: {message}")]
    Probe {
        kind: DependencyKind,
        message: String,
    },
}

impl DependencyError {
    pub fn connect(kind: DependencyKind, message: impl Into<String>) -> Self {
        Self::Connect {
            kind,
            message: message.into(),
        }
    }

    pub fn probe(kind: DependencyKind, message: impl Into<String>) -> Self {
        Self::Probe {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> DependencyKind {
        match self {
            Self::Connect { kind, .. } | Self::Probe { kind, .. } => *kind,
        }
    }
}

/// A live connection to an external service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dependency: Any + Send + Sync {
    fn kind(&self) -> DependencyKind;

    /// Round-trips a trivial command to confirm the service is reachable.
    async fn ping(&self) -> Result<(), DependencyError>;

    /// Releases the connection. Best-effort; never fails.
    async fn close(&self);
}

/// Establishes a [`Dependency`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> DependencyKind;

    async fn connect(&self) -> Result<Arc<dyn Dependency>, DependencyError>;
}

/// The handles produced by a successful startup sequence.
#[derive(Clone)]
pub struct Dependencies {
    pub store: Arc<dyn Dependency>,
    pub cache: Arc<dyn Dependency>,
}

impl Dependencies {
    /// The store handle as its concrete type, e.g. [`crate::infrastructure::store::PgStore`].
    pub fn store_as<T: Dependency>(&self) -> Option<&T> {
        let any: &dyn Any = self.store.as_ref();
        any.downcast_ref::<T>()
    }

    /// The cache handle as its concrete type, e.g. [`crate::infrastructure::cache::RedisCache`].
    pub fn cache_as<T: Dependency>(&self) -> Option<&T> {
        let any: &dyn Any = self.cache.as_ref();
        any.downcast_ref::<T>()
    }

    /// Releases the cache first, then the store (reverse of connection order).
    pub async fn close(&self) {
        self.cache.close().await;
        self.store.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn mock(kind: DependencyKind) -> MockDependency {
        let mut dep = MockDependency::new();
        dep.expect_kind().return_const(kind);
        dep
    }

    #[test]
    fn test_concrete_handle_access() {
        let deps = Dependencies {
            store: Arc::new(mock(DependencyKind::Store)),
            cache: Arc::new(mock(DependencyKind::Cache)),
        };

        let store = deps.store_as::<MockDependency>().unwrap();
        assert_eq!(store.kind(), DependencyKind::Store);
        assert!(deps.cache_as::<MockDependency>().is_some());
    }

    #[tokio::test]
    async fn test_close_releases_cache_before_store() {
        let mut seq = Sequence::new();
        let mut store = mock(DependencyKind::Store);
        let mut cache = mock(DependencyKind::Cache);
        cache
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());
        store
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());

        let deps = Dependencies {
            store: Arc::new(store),
            cache: Arc::new(cache),
        };
        deps.close().await;
    }

    #[test]
    fn test_error_kind() {
        let err = DependencyError::connect(DependencyKind::Cache, "refused");
        assert_eq!(err.kind(), DependencyKind::Cache);
        assert_eq!(err.to_string(), "cache connection failed: refused");
    }
}
