//! Dependency-gated startup and ordered shutdown.
//!
//! The sequencer drives [`Lifecycle`] through its phases:
//!
//! 1. Connect the durable store. Failure ends in [`Phase::FailedStartup`].
//! 2. Only after the store is up, connect the cache. Failure ends in [`Phase::FailedStartup`].
//! 3. Bind the listening socket ([`Phase::Listening`]).
//! 4. Serve traffic ([`Phase::Running`]).
//! 5. On shutdown: stop accepting, drain, then release the dependencies.
//!
//! Dependencies are never connected concurrently, so the log line of a failing
//! dependency always names exactly one service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{error, info, warn};

use crate::domain::dependency::{Connector, Dependencies, Dependency, DependencyError};
use crate::domain::lifecycle::{InvalidTransition, Lifecycle, Phase};

/// Reasons the process cannot start serving traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

pub struct Sequencer {
    lifecycle: Lifecycle,
    connect_attempts: usize,
    retry_base: Duration,
}

impl Sequencer {
    /// Creates a sequencer trying each dependency up to `connect_attempts` times.
    pub fn new(connect_attempts: usize) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            connect_attempts: connect_attempts.max(1),
            retry_base: Duration::from_millis(200),
        }
    }

    /// Overrides the first retry delay (doubles on every further attempt).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Connects the store, then the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Dependency`] for the first dependency that cannot be reached.
    /// The cache connector is never invoked when the store fails. A store handle that was
    /// already opened is closed before the error is returned.
    pub async fn connect(
        &self,
        store: &dyn Connector,
        cache: &dyn Connector,
    ) -> Result<Dependencies, StartupError> {
        self.lifecycle.advance(Phase::ConnectingStore)?;
        let store = match self.connect_one(store).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.lifecycle.advance(Phase::ConnectingCache)?;
        let cache = match self.connect_one(cache).await {
            Ok(handle) => handle,
            Err(e) => {
                store.close().await;
                return Err(self.fail(e.into()));
            }
        };

        Ok(Dependencies { store, cache })
    }

    /// Binds the listening socket once both dependencies are connected.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Bind`] if the address is unavailable.
    pub async fn bind(&self, addr: SocketAddr) -> Result<TcpListener, StartupError> {
        if self.phase() != Phase::ConnectingCache {
            return Err(InvalidTransition {
                from: self.phase(),
                to: Phase::Listening,
            }
            .into());
        }

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => return Err(self.fail(StartupError::Bind { addr, source })),
        };

        self.lifecycle.advance(Phase::Listening)?;
        let bound = listener.local_addr().unwrap_or(addr);
        info!(port = bound.port(), "Listening on http://{bound}");
        Ok(listener)
    }

    /// Marks the server as serving traffic.
    pub fn running(&self) -> Result<(), InvalidTransition> {
        self.lifecycle.advance(Phase::Running)
    }

    /// Marks the start of shutdown: the listener no longer accepts connections.
    pub fn shutting_down(&self) -> Result<(), InvalidTransition> {
        self.lifecycle.advance(Phase::ShuttingDown)
    }

    /// Releases the dependency handles after in-flight requests have drained.
    pub async fn stop(&self, deps: &Dependencies) -> Result<(), InvalidTransition> {
        deps.close().await;
        info!("Dependencies released");
        self.lifecycle.advance(Phase::Stopped)
    }

    async fn connect_one(
        &self,
        connector: &dyn Connector,
    ) -> Result<Arc<dyn Dependency>, DependencyError> {
        let kind = connector.kind();
        let base_ms = self.retry_base.as_millis().max(1) as u64;
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(base_ms / 2 + 1)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.connect_attempts - 1);

        let mut attempt = 0usize;
        let total = self.connect_attempts;
        let handle = Retry::spawn(strategy, || {
            attempt += 1;
            let attempt = attempt;
            async move {
                connector.connect().await.inspect_err(|e| {
                    if attempt < total {
                        warn!(dependency = %kind, attempt, error = %e, "Connection attempt failed, retrying");
                    }
                })
            }
        })
        .await?;

        info!(dependency = %kind, "Connected");
        Ok(handle)
    }

    fn fail(&self, err: StartupError) -> StartupError {
        error!(error = %err, "Startup failed");
        if let Err(e) = self.lifecycle.advance(Phase::FailedStartup) {
            warn!(error = %e, "Could not record failed startup");
        }
        err
    }
}
