//! Source actors: rainwater collection and the cistern pump-up.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{run_periodic, ActorReport};
use crate::config::ScheduleConfig;
use crate::rain::{RainDecision, RainStimulus};
use crate::reservoir::Reservoir;
use crate::snapshot::Source;

/// Collects rainwater whenever the rain signal is up.
pub struct PluvialActor {
    reservoir: Arc<Reservoir>,
    rain: Box<dyn RainStimulus>,
    period: Duration,
}

impl PluvialActor {
    pub fn new(
        reservoir: Arc<Reservoir>,
        rain: Box<dyn RainStimulus>,
        schedule: &ScheduleConfig,
    ) -> Self {
        Self {
            reservoir,
            rain,
            period: schedule.ticks(schedule.pluvial_ticks),
        }
    }

    /// One iteration: apply the stimulus, then fill if it is raining.
    ///
    /// Returns whether water was added.
    pub fn tick(&mut self) -> bool {
        match self.rain.next() {
            RainDecision::Raise => {
                self.reservoir.set_rain(true);
            }
            RainDecision::Clear => {
                self.reservoir.set_rain(false);
            }
            RainDecision::Keep => {}
        }

        if self.reservoir.is_raining() {
            self.reservoir.fill(Source::Pluvial)
        } else {
            false
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> ActorReport {
        let period = self.period;
        run_periodic(Source::Pluvial.name(), period, cancel, || self.tick()).await
    }
}

/// What the cistern did on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CisternaAction {
    /// Low tank: tried the pump, then pumped water up
    Filled,
    /// Low tank but the fill was rejected; the pump was switched off
    FillRejected,
    /// Nearly full: switched the pump off
    Stopped,
    /// Level inside the band: nothing to do
    Idle,
}

/// Pumps water up from the cistern when the tank runs low.
pub struct CisternaActor {
    reservoir: Arc<Reservoir>,
    fill_below_pct: f64,
    stop_above_pct: f64,
    period: Duration,
}

impl CisternaActor {
    pub fn new(reservoir: Arc<Reservoir>, schedule: &ScheduleConfig) -> Self {
        Self {
            reservoir,
            fill_below_pct: schedule.cisterna_fill_below_pct,
            stop_above_pct: schedule.cisterna_stop_above_pct,
            period: schedule.ticks(schedule.cisterna_ticks),
        }
    }

    /// One iteration of the band logic.
    ///
    /// The snapshot and the calls that follow are separate critical
    /// sections; other actors may move the level in between.
    pub fn tick(&self) -> CisternaAction {
        let percentage = self.reservoir.snapshot().percentage;

        if percentage < self.fill_below_pct {
            self.reservoir.activate_pump();
            if self.reservoir.fill(Source::Cisterna) {
                CisternaAction::Filled
            } else {
                self.reservoir.deactivate_pump();
                CisternaAction::FillRejected
            }
        } else if percentage >= self.stop_above_pct {
            self.reservoir.deactivate_pump();
            CisternaAction::Stopped
        } else {
            debug!(percentage, "Cisterna idle");
            CisternaAction::Idle
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> ActorReport {
        let period = self.period;
        run_periodic(Source::Cisterna.name(), period, cancel, || {
            self.tick() == CisternaAction::Filled
        })
        .await
    }
}
