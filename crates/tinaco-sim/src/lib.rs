//! Tinaco Simulation: runs the rooftop tank with its six concurrent actors.
//!
//! This crate is the orchestrator around `reservoir-kernel`:
//! - Spawns the sources, consumers, and pump controller as tokio tasks
//! - Polls snapshots like the dashboard would and audits the level invariant
//! - Tallies operation outcomes and writes a JSON run report

pub mod observer;
pub mod results;
pub mod simulation;
pub mod tally;

pub use observer::{LevelStats, Observer, ObserverLog};
pub use results::RunReport;
pub use simulation::{Simulation, SimulationConfig};
pub use tally::{EventTally, TallySummary};
