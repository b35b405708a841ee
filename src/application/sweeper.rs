//! Background eviction of expired rate-limit windows.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::domain::lifecycle::Phase;
use crate::domain::rate_limiter::RateLimiter;

/// Spawns a task that evicts expired client windows every `every`.
///
/// The task exits once the lifecycle leaves the serving phases.
pub fn spawn_sweeper(
    limiter: RateLimiter,
    every: Duration,
    mut phase: watch::Receiver<Phase>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.evict_expired(Instant::now());
                    if removed > 0 {
                        debug!(removed, remaining = limiter.tracked_clients(), "Evicted expired rate limit windows");
                    }
                }
                changed = phase.changed() => {
                    let current = *phase.borrow();
                    if changed.is_err() || current == Phase::ShuttingDown || current.is_terminal() {
                        break;
                    }
                }
            }
        }

        debug!("Rate limit sweeper stopped");
    })
}
