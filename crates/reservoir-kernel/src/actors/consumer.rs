//! Consumer actors: one periodic draw per tick, no further logic.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{run_periodic, ActorReport};
use crate::config::ScheduleConfig;
use crate::reservoir::Reservoir;
use crate::snapshot::Consumer;

/// Draws water for one outlet every period.
///
/// Success or failure is recorded entirely by the reservoir.
pub struct ConsumerActor {
    reservoir: Arc<Reservoir>,
    consumer: Consumer,
    period: Duration,
}

impl ConsumerActor {
    pub fn new(reservoir: Arc<Reservoir>, consumer: Consumer, schedule: &ScheduleConfig) -> Self {
        let ticks = match consumer {
            Consumer::Jardin => schedule.garden_ticks,
            Consumer::Lavadero => schedule.laundry_ticks,
            Consumer::Banio => schedule.bathroom_ticks,
        };
        Self {
            reservoir,
            consumer,
            period: schedule.ticks(ticks),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick(&self) -> bool {
        self.reservoir.consume(self.consumer)
    }

    pub async fn run(self, cancel: CancellationToken) -> ActorReport {
        run_periodic(self.consumer.name(), self.period, cancel, || self.tick()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReservoirConfig;

    #[test]
    fn test_periods_follow_schedule() {
        let reservoir = Arc::new(Reservoir::new(ReservoirConfig::default()).unwrap());
        let schedule = ScheduleConfig::default();
        let garden = ConsumerActor::new(reservoir.clone(), Consumer::Jardin, &schedule);
        let laundry = ConsumerActor::new(reservoir.clone(), Consumer::Lavadero, &schedule);
        let bathroom = ConsumerActor::new(reservoir, Consumer::Banio, &schedule);

        assert_eq!(garden.period(), Duration::from_secs(5));
        assert_eq!(laundry.period(), Duration::from_secs(4));
        assert_eq!(bathroom.period(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_bathroom_actor_drains_until_cancelled() {
        let reservoir = Arc::new(
            Reservoir::new(ReservoirConfig {
                initial_level: 12.0,
                ..Default::default()
            })
            .unwrap(),
        );
        let schedule = ScheduleConfig {
            tick_ms: 1,
            ..Default::default()
        };
        let actor = ConsumerActor::new(reservoir.clone(), Consumer::Banio, &schedule);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(actor.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let report = task.await.unwrap();

        // 12 -> 7 -> 2, then every further attempt is rejected.
        assert_eq!(report.successes, 2);
        assert!(report.ticks > 2);
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.level, 2.0);
        assert!(!snapshot.consumers.banio);
    }
}
