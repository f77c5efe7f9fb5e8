//! Pump controller: a two-state machine driven by the pump signal.
//!
//! ```text
//!            activate_pump() by Cisterna
//!   ┌──────┐ ───────────────────────────► ┌────────┐
//!   │ Idle │                              │ Active │ ── snapshot every poll
//!   └──────┘ ◄─────────────────────────── └────────┘
//!            no outlet running, or level below cutoff → deactivate_pump()
//!            pump already off (switched off elsewhere)
//! ```
//!
//! The controller never starts the pump itself. Its shut-off check reads a
//! snapshot and acts on it in a second critical section, so a consumer flag
//! can change in between; the next poll corrects it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{pause, ActorReport};
use crate::config::ScheduleConfig;
use crate::reservoir::Reservoir;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Active,
}

/// Outcome of evaluating one snapshot while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpDecision {
    /// Keep running
    Stay,
    /// Switch the pump off
    Deactivate,
    /// Someone else already switched it off
    Released,
}

pub struct PumpController {
    reservoir: Arc<Reservoir>,
    poll: Duration,
    cutoff_pct: f64,
    state: PumpState,
}

impl PumpController {
    pub fn new(reservoir: Arc<Reservoir>, schedule: &ScheduleConfig) -> Self {
        Self {
            reservoir,
            poll: schedule.ticks(schedule.pump_poll_ticks),
            cutoff_pct: schedule.pump_cutoff_pct,
            state: PumpState::Idle,
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Decide what to do with the pump given a snapshot.
    pub fn evaluate(&self, snapshot: &Snapshot) -> PumpDecision {
        if !snapshot.pump_active {
            PumpDecision::Released
        } else if !snapshot.consumers.any() || snapshot.percentage < self.cutoff_pct {
            PumpDecision::Deactivate
        } else {
            PumpDecision::Stay
        }
    }

    /// Evaluate the live state once and apply the decision.
    ///
    /// Only meaningful while `Active`; returns the decision taken.
    pub fn check(&mut self) -> PumpDecision {
        let snapshot = self.reservoir.snapshot();
        let decision = self.evaluate(&snapshot);
        self.apply(decision, &snapshot)
    }

    /// Act on a decision made from `snapshot`.
    ///
    /// The pump may have been switched off since the snapshot was taken; a
    /// `Deactivate` that finds it already off is downgraded to `Released`.
    pub fn apply(&mut self, decision: PumpDecision, snapshot: &Snapshot) -> PumpDecision {
        match decision {
            PumpDecision::Stay => PumpDecision::Stay,
            PumpDecision::Deactivate if self.reservoir.deactivate_pump() => {
                info!(
                    percentage = format!("{:.1}%", snapshot.percentage),
                    outlets_running = snapshot.consumers.any(),
                    "Pump controller switched pump off"
                );
                self.state = PumpState::Idle;
                PumpDecision::Deactivate
            }
            PumpDecision::Deactivate | PumpDecision::Released => {
                debug!("Pump switched off elsewhere");
                self.state = PumpState::Idle;
                PumpDecision::Released
            }
        }
    }

    /// Run until cancelled.
    ///
    /// While idle, waits on the pump signal for at most one poll interval at
    /// a time. While active, re-checks the tank every poll interval.
    /// `ticks` counts activations seen; `successes` counts shut-offs made.
    pub async fn run(mut self, cancel: CancellationToken) -> ActorReport {
        info!(poll_ms = self.poll.as_millis() as u64, "Pump controller started");

        let mut report = ActorReport::new("Bomba");
        let mut signal = self.reservoir.subscribe_pump();

        while !cancel.is_cancelled() {
            match self.state {
                PumpState::Idle => {
                    let woke = tokio::select! {
                        _ = cancel.cancelled() => break,
                        waited = tokio::time::timeout(self.poll, async {
                            signal.wait_for(|on| *on).await.is_ok()
                        }) => waited.unwrap_or(false),
                    };
                    if woke {
                        debug!("Pump signal raised");
                        self.state = PumpState::Active;
                        report.ticks += 1;
                    }
                }
                PumpState::Active => {
                    if self.check() == PumpDecision::Deactivate {
                        report.successes += 1;
                    }
                    if self.state == PumpState::Active && !pause(&cancel, self.poll).await {
                        break;
                    }
                }
            }
        }

        info!(
            activations = report.ticks,
            shutoffs = report.successes,
            "Pump controller stopped"
        );
        report
    }
}
