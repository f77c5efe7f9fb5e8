//! Reservoir Kernel: a capacity-bounded tank shared by concurrent periodic actors.
//!
//! The [`Reservoir`] owns the level and the component flags behind one lock
//! and enforces every threshold rule. Sources, consumers, and the pump
//! controller are independent tokio tasks that only ever touch the tank
//! through its operations.

pub mod actors;
pub mod config;
pub mod events;
pub mod rain;
pub mod reservoir;
pub mod snapshot;

pub use actors::{
    ActorReport, CisternaAction, CisternaActor, ConsumerActor, PluvialActor, PumpController,
    PumpDecision, PumpState,
};
pub use config::{DrawConfig, FlowConfig, ReservoirConfig, ScheduleConfig, ThresholdConfig};
pub use events::{EventKind, EventSink, ReservoirEvent, TracingSink};
pub use rain::{RainDecision, RainStimulus, RandomRain, ScriptedRain};
pub use reservoir::{Reservoir, ReservoirBuilder};
pub use snapshot::{Consumer, ConsumerFlags, Snapshot, Source, SourceFlags};
