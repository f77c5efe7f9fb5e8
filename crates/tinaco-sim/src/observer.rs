//! Observer: the dashboard stand-in that polls snapshots at its own cadence.
//!
//! It never mutates the tank. Every sample is checked against the level
//! invariant so concurrent runs can be audited afterwards.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use reservoir_kernel::{Reservoir, Snapshot};

/// Running aggregates over everything the observer saw.
///
/// No individual snapshot is kept, so a run without a fixed duration polls
/// in constant memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserverLog {
    pub samples_taken: usize,
    /// Samples whose level lay outside `[0, capacity_max]`
    pub invariant_violations: u64,
    min_level: f64,
    max_level: f64,
    level_sum: f64,
    pump_on: usize,
}

/// Aggregate view over the samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub min_level: f64,
    pub max_level: f64,
    pub mean_level: f64,
    /// Fraction of samples with the pump on
    pub pump_active_ratio: f64,
}

impl ObserverLog {
    /// Fold one snapshot into the aggregates.
    pub fn record(&mut self, snapshot: &Snapshot) {
        let level = snapshot.level;
        if self.samples_taken == 0 {
            self.min_level = level;
            self.max_level = level;
        } else {
            self.min_level = self.min_level.min(level);
            self.max_level = self.max_level.max(level);
        }
        self.level_sum += level;
        if snapshot.pump_active {
            self.pump_on += 1;
        }
        self.samples_taken += 1;
    }

    pub fn stats(&self) -> Option<LevelStats> {
        if self.samples_taken == 0 {
            return None;
        }

        let n = self.samples_taken as f64;
        Some(LevelStats {
            min_level: self.min_level,
            max_level: self.max_level,
            mean_level: self.level_sum / n,
            pump_active_ratio: self.pump_on as f64 / n,
        })
    }
}

pub struct Observer {
    reservoir: Arc<Reservoir>,
    interval: Duration,
}

impl Observer {
    pub fn new(reservoir: Arc<Reservoir>, interval: Duration) -> Self {
        Self {
            reservoir,
            interval,
        }
    }

    /// Take and check one sample.
    fn sample(&self, log: &mut ObserverLog) {
        let snapshot = self.reservoir.snapshot();
        let capacity_max = self.reservoir.config().capacity_max;

        if !(0.0..=capacity_max).contains(&snapshot.level) {
            log.invariant_violations += 1;
            error!(
                level = snapshot.level,
                capacity_max, "Level invariant violated"
            );
        }
        debug!(status = %snapshot, "Observed");

        log.record(&snapshot);
    }

    /// Poll until cancelled, then take one final sample.
    pub async fn run(self, cancel: CancellationToken) -> ObserverLog {
        info!(interval_ms = self.interval.as_millis() as u64, "Observer started");

        let mut log = ObserverLog::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sample(&mut log),
            }
        }
        self.sample(&mut log);

        info!(
            samples = log.samples_taken,
            violations = log.invariant_violations,
            "Observer stopped"
        );
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reservoir_kernel::{ConsumerFlags, ReservoirConfig, SourceFlags};

    fn sample(level: f64, pump_active: bool) -> Snapshot {
        Snapshot {
            level,
            percentage: level / 10.0,
            pump_active,
            sources: SourceFlags::default(),
            consumers: ConsumerFlags::default(),
        }
    }

    #[test]
    fn test_stats() {
        let mut log = ObserverLog::default();
        assert!(log.stats().is_none());

        for (level, pump) in [(300.0, false), (330.0, true), (270.0, false), (300.0, true)] {
            log.record(&sample(level, pump));
        }
        let stats = log.stats().unwrap();
        assert_eq!(stats.min_level, 270.0);
        assert_eq!(stats.max_level, 330.0);
        assert_eq!(stats.mean_level, 300.0);
        assert_eq!(stats.pump_active_ratio, 0.5);
        assert_eq!(log.samples_taken, 4);
    }

    #[test]
    fn test_log_size_is_fixed_across_many_samples() {
        let mut log = ObserverLog::default();
        log.record(&sample(100.0, false));
        let size_after_one = serde_json::to_string(&log).unwrap().len();

        for i in 0..100_000 {
            log.record(&sample(100.0 + (i % 2) as f64 * 100.0, i % 3 == 0));
        }
        log.record(&sample(100.0, false));

        assert_eq!(log.samples_taken, 100_002);
        // Only aggregates grow; their serialized form stays about the same size.
        let size_after_many = serde_json::to_string(&log).unwrap().len();
        assert!(size_after_many < size_after_one + 64);
        assert_eq!(log.stats().unwrap().max_level, 200.0);
    }

    #[tokio::test]
    async fn test_observer_samples_until_cancelled() {
        let reservoir = Arc::new(Reservoir::new(ReservoirConfig::default()).unwrap());
        let observer = Observer::new(reservoir.clone(), Duration::from_millis(5));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(observer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        reservoir.fill_from_cisterna();
        cancel.cancel();
        let log = task.await.unwrap();

        assert!(log.samples_taken >= 3);
        assert_eq!(log.invariant_violations, 0);
        let stats = log.stats().unwrap();
        assert_eq!(stats.min_level, 300.0);
        assert_eq!(stats.max_level, 330.0);
    }
}
