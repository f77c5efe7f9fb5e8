//! Simulation runner: wires the tank, the six actors, and the observer.
//!
//! Orchestrates the run lifecycle:
//! 1. Build the shared reservoir with tracing and tally sinks
//! 2. Spawn every actor and the observer on one cancellation token
//! 3. Wait for the run duration or an external shutdown
//! 4. Cancel, join with a grace period, abort stragglers
//! 5. Collect the run report

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use reservoir_kernel::{
    ActorReport, CisternaActor, Consumer, ConsumerActor, PluvialActor, PumpController,
    RandomRain, Reservoir, ReservoirConfig, ScheduleConfig, TracingSink,
};

use crate::observer::Observer;
use crate::results::RunReport;
use crate::tally::EventTally;

/// Default time each actor gets to finish after cancellation.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Top-level configuration, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub reservoir: ReservoirConfig,
    pub schedule: ScheduleConfig,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        self.reservoir.validate().context("invalid reservoir config")?;
        self.schedule.validate().context("invalid schedule config")?;
        Ok(())
    }

    /// Load from a JSON file. Missing sections and fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        Ok(config)
    }
}

pub struct Simulation {
    config: SimulationConfig,
    seed: Option<u64>,
    shutdown_grace: Duration,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            seed: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Fix the rain stimulus seed for reproducible weather.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Run until `duration` elapses (if given) or `shutdown` is cancelled.
    ///
    /// `shutdown` is the single signal shared by every actor; cancelling it
    /// from outside (e.g. on Ctrl-C) ends the run early.
    pub async fn run(
        &self,
        duration: Option<Duration>,
        shutdown: CancellationToken,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let schedule = &self.config.schedule;

        let tally = Arc::new(EventTally::new());
        let reservoir = Arc::new(
            Reservoir::builder(self.config.reservoir.clone())
                .add_sink(Arc::new(TracingSink))
                .add_sink(tally.clone())
                .build()?,
        );

        info!(
            initial_level = self.config.reservoir.initial_level,
            capacity_max = self.config.reservoir.capacity_max,
            tick_ms = schedule.tick_ms,
            duration_ms = duration.map(|d| d.as_millis() as u64),
            "Starting simulation"
        );

        let rain = RandomRain::new(schedule.rain_probability, schedule.sticky_rain, self.seed);
        let mut actors: Vec<(String, JoinHandle<ActorReport>)> = vec![
            (
                "Pluvial".to_string(),
                tokio::spawn(
                    PluvialActor::new(reservoir.clone(), Box::new(rain), schedule)
                        .run(shutdown.clone()),
                ),
            ),
            (
                "Cisterna".to_string(),
                tokio::spawn(
                    CisternaActor::new(reservoir.clone(), schedule).run(shutdown.clone()),
                ),
            ),
            (
                "Bomba".to_string(),
                tokio::spawn(
                    PumpController::new(reservoir.clone(), schedule).run(shutdown.clone()),
                ),
            ),
        ];
        for consumer in Consumer::ALL {
            let actor = ConsumerActor::new(reservoir.clone(), consumer, schedule);
            actors.push((
                consumer.name().to_string(),
                tokio::spawn(actor.run(shutdown.clone())),
            ));
        }

        let observer = tokio::spawn(
            Observer::new(reservoir.clone(), schedule.observer_interval()).run(shutdown.clone()),
        );

        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = shutdown.cancelled() => info!("Shutdown requested"),
                    _ = tokio::time::sleep(duration) => info!("Run duration elapsed"),
                }
            }
            None => shutdown.cancelled().await,
        }
        shutdown.cancel();
        info!("Cancellation sent to all actors");

        let grace = self.shutdown_grace;
        let joined = join_all(actors.into_iter().map(|(name, handle)| async move {
            let outcome = join_with_grace(handle, grace).await;
            (name, outcome)
        }))
        .await;

        let mut reports = Vec::new();
        let mut force_stopped = Vec::new();
        for (name, outcome) in joined {
            match outcome {
                Some(report) => reports.push(report),
                None => force_stopped.push(name),
            }
        }

        let log = join_with_grace(observer, grace).await.unwrap_or_else(|| {
            force_stopped.push("Observer".to_string());
            Default::default()
        });

        let final_snapshot = reservoir.snapshot();
        let ended_at = Utc::now();

        info!(
            final_level = final_snapshot.level,
            samples = log.samples_taken,
            violations = log.invariant_violations,
            force_stopped = force_stopped.len(),
            "Simulation finished"
        );

        Ok(RunReport {
            run_id: Uuid::new_v4(),
            started_at,
            ended_at,
            config: self.config.clone(),
            seed: self.seed,
            final_snapshot,
            level_stats: log.stats(),
            samples_taken: log.samples_taken,
            invariant_violations: log.invariant_violations,
            events: tally.summary(),
            actors: reports,
            force_stopped,
        })
    }
}

/// Await a task for at most `grace`; abort it if it does not finish.
///
/// Returns `None` for aborted or panicked tasks.
async fn join_with_grace<T>(mut handle: JoinHandle<T>, grace: Duration) -> Option<T> {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(error = %e, "Task failed");
            None
        }
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "Task did not stop in time, aborting");
            handle.abort();
            None
        }
    }
}
