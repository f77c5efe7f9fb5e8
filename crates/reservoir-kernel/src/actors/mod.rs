//! Periodic actors sharing one [`Reservoir`](crate::Reservoir).
//!
//! Each actor is a long-running tokio task that acts, then sleeps for its
//! period, until the shared cancellation token fires:
//!
//! ```text
//! Pluvial  (4 ticks) ── rain? ──► fill(Pluvial)
//! Cisterna (3 ticks) ── snapshot ─┬─ <30% ─► activate_pump, fill(Cisterna) [, deactivate_pump]
//!                                 └─ ≥90% ─► deactivate_pump
//! Jardin   (5 ticks) ──► consume(Jardin)
//! Lavadero (4 ticks) ──► consume(Lavadero)
//! Banio    (3 ticks) ──► consume(Banio)
//! Pump     (1 tick)  ── signal ─► Active ── snapshot ─► no outlet or <25% ─► deactivate_pump
//! ```
//!
//! The reservoir lock is only ever held inside a single reservoir call, never
//! across a sleep. Sleeps and waits race the cancellation token, so shutdown
//! never waits out a period.

mod consumer;
mod pump;
mod source;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use consumer::ConsumerActor;
pub use pump::{PumpController, PumpDecision, PumpState};
pub use source::{CisternaAction, CisternaActor, PluvialActor};

/// Per-actor counters returned when an actor stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorReport {
    pub actor: String,
    /// Loop iterations executed
    pub ticks: u64,
    /// Iterations whose action succeeded
    pub successes: u64,
}

impl ActorReport {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ..Default::default()
        }
    }

    fn record(&mut self, success: bool) {
        self.ticks += 1;
        if success {
            self.successes += 1;
        }
    }
}

/// Sleep for `period` unless cancelled first. Returns `false` on cancellation.
pub(crate) async fn pause(cancel: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

/// Drive `step` every `period` until cancelled.
pub(crate) async fn run_periodic<F>(
    name: &str,
    period: Duration,
    cancel: CancellationToken,
    mut step: F,
) -> ActorReport
where
    F: FnMut() -> bool,
{
    info!(actor = name, period_ms = period.as_millis() as u64, "Actor started");

    let mut report = ActorReport::new(name);
    while !cancel.is_cancelled() {
        report.record(step());
        if !pause(&cancel, period).await {
            break;
        }
    }

    info!(
        actor = name,
        ticks = report.ticks,
        successes = report.successes,
        "Actor stopped"
    );
    report
}
