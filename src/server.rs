//! HTTP server initialization and runtime lifecycle.
//!
//! Connects the store, then the cache, binds the listener, serves until a shutdown
//! signal arrives, drains in-flight requests and finally releases the dependencies.
//! Requests still running when the grace period ends are cancelled with `503`; the
//! dependencies are released only after the last one has completed.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

use crate::api::middleware::in_flight::{self, RequestTracker};
use crate::api::pipeline::{Pipeline, PipelineSettings};
use crate::application::sequencer::{Sequencer, StartupError};
use crate::application::sweeper::spawn_sweeper;
use crate::config::Config;
use crate::domain::dependency::{Connector, Dependencies};
use crate::domain::lifecycle::Phase;
use crate::domain::rate_limiter::RateLimiter;
use crate::infrastructure::cache::RedisConnector;
use crate::infrastructure::store::PgConnector;
use crate::routes::{RouteGroups, app_router};
use crate::state::AppState;

/// A server that has connected its dependencies and bound its socket but not yet
/// started serving.
pub struct Server {
    sequencer: Sequencer,
    deps: Dependencies,
    limiter: RateLimiter,
    listener: TcpListener,
    app: Router,
    requests: RequestTracker,
    sweep_every: Duration,
    grace: Duration,
}

impl Server {
    /// Runs the startup sequence.
    ///
    /// Order:
    /// 1. Store connection (`store`)
    /// 2. Cache connection (`cache`), only after the store succeeded
    /// 3. Socket bind, only after both succeeded
    ///
    /// `groups` is called once with the connected dependencies to build the
    /// tracking, analytics and campaigns routers.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Dependencies connected before a failure are released
    /// and no socket stays bound.
    pub async fn start<G>(
        config: &Config,
        store: &dyn Connector,
        cache: &dyn Connector,
        groups: G,
    ) -> Result<Self, StartupError>
    where
        G: FnOnce(&Dependencies) -> RouteGroups,
    {
        let addr = config
            .listen_addr()
            .map_err(|e| StartupError::Config(format!("{e:#}")))?;

        let sequencer = Sequencer::new(config.connect_attempts);
        let deps = sequencer.connect(store, cache).await?;

        let listener = match sequencer.bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                deps.close().await;
                return Err(e);
            }
        };

        let limiter = RateLimiter::new(config.rate_max_requests, config.rate_window());

        let pipeline = Pipeline::new(PipelineSettings::from_config(config, limiter.clone()));
        let state = AppState::new(deps.clone(), limiter.clone());
        let requests = RequestTracker::new();
        let app = app_router(state, groups(&deps), &pipeline).layer(
            middleware::from_fn_with_state(requests.clone(), in_flight::layer),
        );

        Ok(Self {
            sequencer,
            deps,
            limiter,
            listener,
            app,
            requests,
            sweep_every: Duration::from_secs(config.rate_sweep_secs.max(1)),
            grace: config.shutdown_grace(),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Observes lifecycle phase changes.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.sequencer.lifecycle().subscribe()
    }

    /// Serves requests until `shutdown` resolves, then drains and releases dependencies.
    ///
    /// In-flight requests get the configured grace period to finish. After that they are
    /// cancelled and answered with `503`. Dependencies are released only once no request
    /// is running.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server {
            sequencer,
            deps,
            limiter,
            listener,
            app,
            requests,
            sweep_every,
            grace,
        } = self;

        sequencer.running()?;
        let sweeper = spawn_sweeper(limiter, sweep_every, sequencer.lifecycle().subscribe());

        let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
        let graceful = async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        };

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful)
        .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Server terminated unexpectedly");
                    requests.cancel();
                }
            }
            _ = signalled_rx => {
                sequencer.shutting_down()?;
                tracing::info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining connections");

                match tokio::time::timeout(grace, &mut server).await {
                    Ok(Ok(())) => tracing::info!("All connections drained"),
                    Ok(Err(e)) => tracing::error!(error = %e, "Server error while draining"),
                    Err(_) => {
                        tracing::warn!(
                            in_flight = requests.active(),
                            "Grace period elapsed, cancelling in-flight requests"
                        );
                        requests.cancel();
                    }
                }
            }
        }

        if sequencer.phase() == Phase::Running {
            sequencer.shutting_down()?;
        }

        requests.idle().await;
        tracing::debug!("No requests in flight");

        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Rate limit sweeper task failed");
        }

        sequencer.stop(&deps).await?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Runs the gateway with PostgreSQL and Redis until a shutdown signal.
///
/// # Errors
///
/// Returns an error if a dependency cannot be reached or the port cannot be bound.
pub async fn run<G>(config: Config, groups: G) -> Result<(), StartupError>
where
    G: FnOnce(&Dependencies) -> RouteGroups,
{
    let store = PgConnector::from_config(&config);
    let cache = RedisConnector::new(config.redis_url.clone());

    let server = Server::start(&config, &store, &cache, groups).await?;
    server.serve(shutdown_signal()).await
}
