//! The shared tank: one lock over level and component flags.
//!
//! Every public operation takes the lock once, decides and mutates under it,
//! and releases it before notifying sinks. Decisions mix the level with the
//! flags, so the whole composite sits behind a single mutex rather than a set
//! of atomics.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::watch;

use crate::config::ReservoirConfig;
use crate::events::{EventSink, ReservoirEvent};
use crate::snapshot::{Consumer, ConsumerFlags, Snapshot, Source, SourceFlags};

/// Mutable state guarded by the reservoir lock.
#[derive(Debug)]
struct Tank {
    level: f64,
    pump_active: bool,
    raining: bool,
    sources: SourceFlags,
    consumers: ConsumerFlags,
}

/// Capacity-bounded water store shared by all actors.
///
/// Holds `0 <= level <= capacity_max` across every operation. Rule
/// violations are reported as `false`, never as errors.
pub struct Reservoir {
    config: ReservoirConfig,
    tank: Mutex<Tank>,
    /// Mirrors `pump_active`; only written while the tank lock is held
    pump_signal: watch::Sender<bool>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for Reservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservoir")
            .field("snapshot", &self.snapshot())
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for a [`Reservoir`] with attached event sinks.
pub struct ReservoirBuilder {
    config: ReservoirConfig,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl ReservoirBuilder {
    pub fn new(config: ReservoirConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
        }
    }

    /// Attach a sink. Sinks are notified in the order they were added.
    pub fn add_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate the configuration and create the reservoir.
    pub fn build(self) -> Result<Reservoir> {
        self.config.validate()?;

        let (pump_signal, _) = watch::channel(false);
        let tank = Tank {
            level: self.config.initial_level,
            pump_active: false,
            raining: false,
            sources: SourceFlags::default(),
            consumers: ConsumerFlags::default(),
        };

        Ok(Reservoir {
            config: self.config,
            tank: Mutex::new(tank),
            pump_signal,
            sinks: self.sinks,
        })
    }
}

impl Reservoir {
    /// Create a reservoir without sinks.
    pub fn new(config: ReservoirConfig) -> Result<Self> {
        ReservoirBuilder::new(config).build()
    }

    pub fn builder(config: ReservoirConfig) -> ReservoirBuilder {
        ReservoirBuilder::new(config)
    }

    pub fn config(&self) -> &ReservoirConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Tank> {
        // No operation can panic between reading and writing the tank, so a
        // poisoned guard still holds consistent state.
        self.tank.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn percentage_of(&self, level: f64) -> f64 {
        level / self.config.capacity_max * 100.0
    }

    fn emit(&self, event: &ReservoirEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }

    /// Add one unit of `source`'s flow unless it would overflow the tank.
    ///
    /// Records the outcome in the source's flag either way. Rain is not
    /// checked here; the pluvial actor gates on it.
    pub fn fill(&self, source: Source) -> bool {
        let flow = match source {
            Source::Pluvial => self.config.flows.pluvial,
            Source::Cisterna => self.config.flows.cisterna,
        };

        let (filled, event) = {
            let mut tank = self.lock();
            let filled = tank.level + flow <= self.config.capacity_max;
            if filled {
                tank.level += flow;
            }
            tank.sources.set(source, filled);

            let level = tank.level;
            let percentage = self.percentage_of(level);
            let event = if filled {
                ReservoirEvent::Filled {
                    source,
                    added: flow,
                    level,
                    percentage,
                }
            } else {
                ReservoirEvent::FillRejected {
                    source,
                    level,
                    percentage,
                }
            };
            (filled, event)
        };

        self.emit(&event);
        filled
    }

    pub fn fill_from_pluvial(&self) -> bool {
        self.fill(Source::Pluvial)
    }

    pub fn fill_from_cisterna(&self) -> bool {
        self.fill(Source::Cisterna)
    }

    /// Draw one unit for `consumer` if its thresholds allow it.
    ///
    /// - Jardin: level above the garden gate and the draw leaves at least
    ///   `capacity_min`.
    /// - Lavadero: level above the laundry floor and the draw stays on it.
    /// - Banio: any water at all and the draw stays at or above zero.
    pub fn consume(&self, consumer: Consumer) -> bool {
        let (draw, gate, floor) = match consumer {
            Consumer::Jardin => (
                self.config.draws.garden,
                self.config.garden_gate_level(),
                self.config.capacity_min,
            ),
            Consumer::Lavadero => {
                let floor = self.config.laundry_floor_level();
                (self.config.draws.laundry, floor, floor)
            }
            Consumer::Banio => (self.config.draws.bathroom, 0.0, 0.0),
        };

        let (consumed, event) = {
            let mut tank = self.lock();
            let consumed = tank.level > gate && tank.level - draw >= floor;
            if consumed {
                tank.level -= draw;
            }
            tank.consumers.set(consumer, consumed);

            let level = tank.level;
            let percentage = self.percentage_of(level);
            let event = if consumed {
                ReservoirEvent::Consumed {
                    consumer,
                    removed: draw,
                    level,
                    percentage,
                }
            } else {
                ReservoirEvent::ConsumeRejected {
                    consumer,
                    level,
                    percentage,
                }
            };
            (consumed, event)
        };

        self.emit(&event);
        consumed
    }

    pub fn consume_garden(&self) -> bool {
        self.consume(Consumer::Jardin)
    }

    pub fn consume_laundry(&self) -> bool {
        self.consume(Consumer::Lavadero)
    }

    pub fn consume_bathroom(&self) -> bool {
        self.consume(Consumer::Banio)
    }

    /// Switch the pump on if it is off and the level is strictly above the
    /// activation threshold. Raises the pump signal on success.
    ///
    /// Calling while the pump is already on returns `false` and changes
    /// nothing.
    pub fn activate_pump(&self) -> bool {
        let (activated, event) = {
            let mut tank = self.lock();
            if tank.pump_active {
                (false, None)
            } else {
                let percentage = self.percentage_of(tank.level);
                if tank.level > self.config.pump_activation_level() {
                    tank.pump_active = true;
                    self.pump_signal.send_replace(true);
                    (true, Some(ReservoirEvent::PumpActivated { percentage }))
                } else {
                    (
                        false,
                        Some(ReservoirEvent::PumpActivationRejected { percentage }),
                    )
                }
            }
        };

        if let Some(event) = event {
            self.emit(&event);
        }
        activated
    }

    /// Switch the pump off and clear the pump signal. Returns `false` if it
    /// was already off.
    pub fn deactivate_pump(&self) -> bool {
        let event = {
            let mut tank = self.lock();
            if !tank.pump_active {
                return false;
            }
            tank.pump_active = false;
            self.pump_signal.send_replace(false);
            ReservoirEvent::PumpDeactivated {
                percentage: self.percentage_of(tank.level),
            }
        };

        self.emit(&event);
        true
    }

    /// Receiver that observes every pump on/off transition.
    pub fn subscribe_pump(&self) -> watch::Receiver<bool> {
        self.pump_signal.subscribe()
    }

    /// Set or clear the external rain stimulus. Returns the previous value.
    pub fn set_rain(&self, raining: bool) -> bool {
        let previous = {
            let mut tank = self.lock();
            std::mem::replace(&mut tank.raining, raining)
        };

        if previous != raining {
            self.emit(&ReservoirEvent::RainChanged { raining });
        }
        previous
    }

    pub fn is_raining(&self) -> bool {
        self.lock().raining
    }

    /// Capture the full state in one critical section.
    pub fn snapshot(&self) -> Snapshot {
        let tank = self.lock();
        Snapshot {
            level: tank.level,
            percentage: self.percentage_of(tank.level),
            pump_active: tank.pump_active,
            sources: tank.sources,
            consumers: tank.consumers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use rand::prelude::*;

    /// Sink that keeps every event for inspection.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ReservoirEvent>>,
    }

    impl EventSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn record(&self, event: &ReservoirEvent) {
            self.events.lock().unwrap().push(*event);
        }
    }

    fn reservoir_at(level: f64) -> Reservoir {
        Reservoir::new(ReservoirConfig {
            initial_level: level,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_cisterna_fill_from_initial_level() {
        let reservoir = reservoir_at(300.0);
        assert!(reservoir.fill_from_cisterna());

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.level, 330.0);
        assert!(snapshot.sources.cisterna);
        assert!(!snapshot.sources.pluvial);
    }

    #[test]
    fn test_pluvial_fill_rejected_near_capacity() {
        let reservoir = reservoir_at(995.0);
        assert!(!reservoir.fill_from_pluvial());

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.level, 995.0);
        assert!(!snapshot.sources.pluvial);
    }

    #[test]
    fn test_fill_to_exact_capacity_succeeds() {
        let reservoir = reservoir_at(970.0);
        assert!(reservoir.fill_from_cisterna());
        assert_eq!(reservoir.snapshot().level, 1000.0);
        assert!(!reservoir.fill_from_cisterna());
        assert!(!reservoir.snapshot().sources.cisterna);
    }

    #[test]
    fn test_failed_fill_clears_previous_success_flag() {
        let reservoir = reservoir_at(980.0);
        assert!(reservoir.fill_from_pluvial());
        assert!(reservoir.snapshot().sources.pluvial);
        assert!(!reservoir.fill_from_pluvial());
        assert!(!reservoir.snapshot().sources.pluvial);
    }

    #[test]
    fn test_garden_draws_above_half() {
        let reservoir = reservoir_at(600.0);
        assert!(reservoir.consume_garden());
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.level, 590.0);
        assert!(snapshot.consumers.jardin);

        // 505 is above the gate and 495 stays above the 100 L floor.
        let reservoir = reservoir_at(505.0);
        assert!(reservoir.consume_garden());
        assert_eq!(reservoir.snapshot().level, 495.0);
    }

    #[test]
    fn test_garden_gate_is_strict() {
        let reservoir = reservoir_at(500.0);
        assert!(!reservoir.consume_garden());
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.level, 500.0);
        assert!(!snapshot.consumers.jardin);
    }

    #[test]
    fn test_garden_respects_capacity_min() {
        // Raise the floor so the gate holds but the draw would breach it.
        let reservoir = Reservoir::new(ReservoirConfig {
            capacity_min: 500.0,
            initial_level: 505.0,
            ..Default::default()
        })
        .unwrap();
        assert!(!reservoir.consume_garden());
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.level, 505.0);
        assert!(!snapshot.consumers.jardin);
    }

    #[test]
    fn test_laundry_floor() {
        assert!(reservoir_at(38.0).consume_laundry());
        assert!(!reservoir_at(37.0).consume_laundry());
        assert!(!reservoir_at(30.0).consume_laundry());

        let reservoir = reservoir_at(38.0);
        reservoir.consume_laundry();
        assert_eq!(reservoir.snapshot().level, 30.0);
        assert!(reservoir.snapshot().consumers.lavadero);
    }

    #[test]
    fn test_bathroom_drains_to_zero() {
        let reservoir = reservoir_at(10.0);
        assert!(reservoir.consume_bathroom());
        assert!(reservoir.consume_bathroom());
        assert_eq!(reservoir.snapshot().level, 0.0);
        assert!(!reservoir.consume_bathroom());
        assert!(!reservoir.snapshot().consumers.banio);

        assert!(!reservoir_at(4.0).consume_bathroom());
        assert!(reservoir_at(5.0).consume_bathroom());
    }

    #[test]
    fn test_pump_activation_threshold_is_strict() {
        let reservoir = reservoir_at(250.0);
        assert!(!reservoir.activate_pump());
        assert!(!reservoir.snapshot().pump_active);

        let reservoir = reservoir_at(250.5);
        assert!(reservoir.activate_pump());
        assert!(reservoir.snapshot().pump_active);
    }

    #[test]
    fn test_pump_toggles_are_idempotent() {
        let reservoir = reservoir_at(300.0);
        assert!(reservoir.activate_pump());
        assert!(!reservoir.activate_pump());
        assert!(reservoir.snapshot().pump_active);

        assert!(reservoir.deactivate_pump());
        assert!(!reservoir.deactivate_pump());
        assert!(!reservoir.snapshot().pump_active);
    }

    #[test]
    fn test_pump_signal_mirrors_state() {
        let reservoir = reservoir_at(300.0);
        let signal = reservoir.subscribe_pump();
        assert!(!*signal.borrow());

        reservoir.activate_pump();
        assert!(*signal.borrow());

        reservoir.deactivate_pump();
        assert!(!*signal.borrow());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let reservoir = reservoir_at(300.0);
        let before = reservoir.snapshot();
        reservoir.fill_from_cisterna();
        reservoir.consume_bathroom();

        assert_eq!(before.level, 300.0);
        assert!(!before.sources.cisterna);
        assert_eq!(reservoir.snapshot().level, 325.0);
    }

    #[test]
    fn test_percentage() {
        let snapshot = reservoir_at(300.0).snapshot();
        assert_eq!(snapshot.percentage, 30.0);
    }

    #[test]
    fn test_sinks_skip_reads_and_repeated_pump_switches() {
        let sink = Arc::new(RecordingSink::default());
        let reservoir = Reservoir::builder(ReservoirConfig::default())
            .add_sink(sink.clone())
            .build()
            .unwrap();

        reservoir.fill_from_cisterna();
        reservoir.consume_garden();
        reservoir.activate_pump();
        reservoir.activate_pump();
        reservoir.deactivate_pump();
        reservoir.deactivate_pump();
        reservoir.set_rain(true);
        reservoir.set_rain(true);

        let kinds: Vec<EventKind> = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Fill(Source::Cisterna),
                EventKind::ConsumeRejected(Consumer::Jardin),
                EventKind::PumpActivated,
                EventKind::PumpDeactivated,
                EventKind::RainChanged,
            ]
        );
    }

    #[test]
    fn test_rain_signal_set_and_clear() {
        let reservoir = reservoir_at(300.0);
        assert!(!reservoir.is_raining());
        assert!(!reservoir.set_rain(true));
        assert!(reservoir.is_raining());
        assert!(reservoir.set_rain(false));
        assert!(!reservoir.is_raining());
    }

    #[test]
    fn test_level_invariant_over_random_operations() {
        let mut rng = StdRng::seed_from_u64(7);
        for start in [0.0, 5.0, 250.0, 505.0, 995.0, 1000.0] {
            let reservoir = reservoir_at(start);
            for _ in 0..5_000 {
                match rng.random_range(0..7) {
                    0 => reservoir.fill_from_pluvial(),
                    1 => reservoir.fill_from_cisterna(),
                    2 => reservoir.consume_garden(),
                    3 => reservoir.consume_laundry(),
                    4 => reservoir.consume_bathroom(),
                    5 => reservoir.activate_pump(),
                    _ => reservoir.deactivate_pump(),
                };
                let level = reservoir.snapshot().level;
                assert!(
                    (0.0..=1000.0).contains(&level),
                    "level {} escaped bounds",
                    level
                );
            }
        }
    }

    #[test]
    fn test_concurrent_callers_keep_level_in_bounds() {
        let reservoir = Arc::new(reservoir_at(300.0));
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let reservoir = reservoir.clone();
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        match i {
                            0 => reservoir.fill_from_pluvial(),
                            1 => reservoir.fill_from_cisterna(),
                            2 => reservoir.consume_garden(),
                            3 => reservoir.consume_laundry(),
                            4 => reservoir.consume_bathroom(),
                            _ => reservoir.activate_pump() || reservoir.deactivate_pump(),
                        };
                    }
                })
            })
            .collect();

        for _ in 0..2_000 {
            let level = reservoir.snapshot().level;
            assert!((0.0..=1000.0).contains(&level));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let level = reservoir.snapshot().level;
        assert!((0.0..=1000.0).contains(&level));
    }
}
