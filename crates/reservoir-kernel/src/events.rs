//! Operation outcomes and the sinks that observe them.
//!
//! Every state-changing or rejected operation produces exactly one
//! [`ReservoirEvent`]. Reads and repeated pump switches produce none. Events
//! are built while the lock is held but delivered to sinks only after it is
//! released, so a slow sink can never stall the other actors.

use std::fmt;

use tracing::{debug, info};

use crate::snapshot::{Consumer, Source};

/// What an operation did to the tank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReservoirEvent {
    /// A source added water
    Filled {
        source: Source,
        added: f64,
        level: f64,
        percentage: f64,
    },
    /// A fill would have overflowed the tank
    FillRejected {
        source: Source,
        level: f64,
        percentage: f64,
    },
    /// An outlet drew water
    Consumed {
        consumer: Consumer,
        removed: f64,
        level: f64,
        percentage: f64,
    },
    /// An outlet's thresholds were not met
    ConsumeRejected {
        consumer: Consumer,
        level: f64,
        percentage: f64,
    },
    PumpActivated {
        percentage: f64,
    },
    /// The pump was off but the level was too low to start it
    PumpActivationRejected {
        percentage: f64,
    },
    PumpDeactivated {
        percentage: f64,
    },
    /// The external rain stimulus changed
    RainChanged {
        raining: bool,
    },
}

/// Coarse classification of an event, used for tallying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Fill(Source),
    FillRejected(Source),
    Consume(Consumer),
    ConsumeRejected(Consumer),
    PumpActivated,
    PumpActivationRejected,
    PumpDeactivated,
    RainChanged,
}

impl ReservoirEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ReservoirEvent::Filled { source, .. } => EventKind::Fill(*source),
            ReservoirEvent::FillRejected { source, .. } => EventKind::FillRejected(*source),
            ReservoirEvent::Consumed { consumer, .. } => EventKind::Consume(*consumer),
            ReservoirEvent::ConsumeRejected { consumer, .. } => {
                EventKind::ConsumeRejected(*consumer)
            }
            ReservoirEvent::PumpActivated { .. } => EventKind::PumpActivated,
            ReservoirEvent::PumpActivationRejected { .. } => EventKind::PumpActivationRejected,
            ReservoirEvent::PumpDeactivated { .. } => EventKind::PumpDeactivated,
            ReservoirEvent::RainChanged { .. } => EventKind::RainChanged,
        }
    }
}

impl fmt::Display for ReservoirEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservoirEvent::Filled {
                source,
                added,
                percentage,
                ..
            } => write!(f, "{} added {:.0}L, level {:.1}%", source, added, percentage),
            ReservoirEvent::FillRejected { source, .. } => {
                write!(f, "{} cannot fill past capacity", source)
            }
            ReservoirEvent::Consumed {
                consumer,
                removed,
                percentage,
                ..
            } => write!(f, "{} drew {:.0}L, level {:.1}%", consumer, removed, percentage),
            ReservoirEvent::ConsumeRejected {
                consumer,
                percentage,
                ..
            } => write!(f, "{} blocked at {:.1}%", consumer, percentage),
            ReservoirEvent::PumpActivated { percentage } => {
                write!(f, "pump on at {:.1}%", percentage)
            }
            ReservoirEvent::PumpActivationRejected { percentage } => {
                write!(f, "pump cannot start, level {:.1}%", percentage)
            }
            ReservoirEvent::PumpDeactivated { percentage } => {
                write!(f, "pump off at {:.1}%", percentage)
            }
            ReservoirEvent::RainChanged { raining } => {
                write!(f, "rain {}", if *raining { "started" } else { "stopped" })
            }
        }
    }
}

/// Receives every operation outcome.
///
/// Sinks are called from the actor tasks, outside the reservoir lock. They
/// must be cheap and must not call back into the reservoir.
pub trait EventSink: Send + Sync {
    /// Unique name for this sink.
    fn name(&self) -> &str;

    fn record(&self, event: &ReservoirEvent);
}

/// Sink that turns events into structured log lines.
///
/// Successful changes log at INFO; rejections are routine and log at DEBUG.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn record(&self, event: &ReservoirEvent) {
        match *event {
            ReservoirEvent::Filled {
                source,
                added,
                level,
                percentage,
            } => info!(
                source = %source,
                added,
                level,
                percentage = format!("{:.1}%", percentage),
                "Filled"
            ),
            ReservoirEvent::FillRejected {
                source,
                level,
                percentage,
            } => debug!(
                source = %source,
                level,
                percentage = format!("{:.1}%", percentage),
                "Fill rejected (capacity)"
            ),
            ReservoirEvent::Consumed {
                consumer,
                removed,
                level,
                percentage,
            } => info!(
                consumer = %consumer,
                removed,
                level,
                percentage = format!("{:.1}%", percentage),
                "Consumed"
            ),
            ReservoirEvent::ConsumeRejected {
                consumer,
                level,
                percentage,
            } => debug!(
                consumer = %consumer,
                level,
                percentage = format!("{:.1}%", percentage),
                "Consumption rejected (level)"
            ),
            ReservoirEvent::PumpActivated { percentage } => {
                info!(percentage = format!("{:.1}%", percentage), "Pump activated")
            }
            ReservoirEvent::PumpActivationRejected { percentage } => debug!(
                percentage = format!("{:.1}%", percentage),
                "Pump activation rejected (level)"
            ),
            ReservoirEvent::PumpDeactivated { percentage } => {
                info!(percentage = format!("{:.1}%", percentage), "Pump deactivated")
            }
            ReservoirEvent::RainChanged { raining } => info!(raining, "Rain signal changed"),
        }
    }
}
