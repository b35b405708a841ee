//! Process lifecycle phases.
//!
//! ```text
//! Idle → ConnectingStore → ConnectingCache → Listening → Running → ShuttingDown → Stopped
//!              │                  │
//!              └──────────────────┴──→ FailedStartup
//! ```
//!
//! The current phase is published on a [`watch`] channel so other tasks can observe it.

use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ConnectingStore,
    ConnectingCache,
    Listening,
    Running,
    ShuttingDown,
    Stopped,
    FailedStartup,
}

impl Phase {
    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, ConnectingStore)
                | (ConnectingStore, ConnectingCache)
                | (ConnectingStore, FailedStartup)
                | (ConnectingCache, Listening)
                | (ConnectingCache, FailedStartup)
                | (Listening, Running)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Stopped | Phase::FailedStartup)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::ConnectingStore => "connecting_store",
            Phase::ConnectingCache => "connecting_cache",
            Phase::Listening => "listening",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting_down",
            Phase::Stopped => "stopped",
            Phase::FailedStartup => "failed_startup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid lifecycle transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Owner of the current [`Phase`].
pub struct Lifecycle {
    tx: watch::Sender<Phase>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Idle);
        Self { tx }
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Moves to `next`, rejecting transitions that are not part of the lifecycle graph.
    pub fn advance(&self, next: Phase) -> Result<(), InvalidTransition> {
        let from = self.phase();
        if !from.can_advance_to(next) {
            return Err(InvalidTransition { from, to: next });
        }

        self.tx.send_replace(next);
        tracing::info!(from = %from, phase = %next, "Lifecycle transition");
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
