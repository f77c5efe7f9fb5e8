//! Event tally: counts operation outcomes for the run report.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use reservoir_kernel::{Consumer, EventKind, EventSink, ReservoirEvent, Source};

/// Sink counting every event by kind.
///
/// Actors record concurrently, so counts live in a DashMap rather than
/// behind another mutex.
#[derive(Debug, Default)]
pub struct EventTally {
    counts: DashMap<EventKind, u64>,
}

/// Serializable view of an [`EventTally`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySummary {
    /// Successful fills per source
    pub fills: BTreeMap<String, u64>,
    pub fill_rejections: BTreeMap<String, u64>,
    /// Successful draws per outlet
    pub consumptions: BTreeMap<String, u64>,
    pub consumption_rejections: BTreeMap<String, u64>,
    pub pump_activations: u64,
    pub pump_activation_rejections: u64,
    pub pump_deactivations: u64,
    pub rain_changes: u64,
}

impl EventTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.counts.get(&kind).map(|c| *c).unwrap_or(0)
    }

    pub fn summary(&self) -> TallySummary {
        let per_source = |kind: fn(Source) -> EventKind| -> BTreeMap<String, u64> {
            Source::ALL
                .iter()
                .map(|s| (s.name().to_string(), self.count(kind(*s))))
                .collect()
        };
        let per_consumer = |kind: fn(Consumer) -> EventKind| -> BTreeMap<String, u64> {
            Consumer::ALL
                .iter()
                .map(|c| (c.name().to_string(), self.count(kind(*c))))
                .collect()
        };

        TallySummary {
            fills: per_source(EventKind::Fill),
            fill_rejections: per_source(EventKind::FillRejected),
            consumptions: per_consumer(EventKind::Consume),
            consumption_rejections: per_consumer(EventKind::ConsumeRejected),
            pump_activations: self.count(EventKind::PumpActivated),
            pump_activation_rejections: self.count(EventKind::PumpActivationRejected),
            pump_deactivations: self.count(EventKind::PumpDeactivated),
            rain_changes: self.count(EventKind::RainChanged),
        }
    }
}

impl EventSink for EventTally {
    fn name(&self) -> &str {
        "tally"
    }

    fn record(&self, event: &ReservoirEvent) {
        *self.counts.entry(event.kind()).or_insert(0) += 1;
    }
}

impl TallySummary {
    /// Net litres moved according to the tally and the configured amounts.
    pub fn net_flow(&self, config: &reservoir_kernel::ReservoirConfig) -> f64 {
        let count = |map: &BTreeMap<String, u64>, name: &str| {
            map.get(name).copied().unwrap_or(0) as f64
        };

        let inflow = count(&self.fills, Source::Pluvial.name()) * config.flows.pluvial
            + count(&self.fills, Source::Cisterna.name()) * config.flows.cisterna;
        let outflow = count(&self.consumptions, Consumer::Jardin.name()) * config.draws.garden
            + count(&self.consumptions, Consumer::Lavadero.name()) * config.draws.laundry
            + count(&self.consumptions, Consumer::Banio.name()) * config.draws.bathroom;
        inflow - outflow
    }
}
