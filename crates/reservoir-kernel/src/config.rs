//! Configuration types for the reservoir and its actors.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Physical parameters of the tank.
///
/// Defaults are the reference rooftop tank: 1000 L capacity, a 100 L floor
/// used by the garden outlet, and 300 L of water at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservoirConfig {
    /// Maximum capacity in litres
    pub capacity_max: f64,

    /// Floor in litres honoured by the garden outlet only
    pub capacity_min: f64,

    /// Level at startup in litres
    pub initial_level: f64,

    /// Litres added per successful fill
    pub flows: FlowConfig,

    /// Litres removed per successful consumption
    pub draws: DrawConfig,

    /// Fractions of `capacity_max` gating the rules
    pub thresholds: ThresholdConfig,
}

/// Inflow per successful fill, by source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub pluvial: f64,
    pub cisterna: f64,
}

/// Outflow per successful consumption, by outlet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub garden: f64,
    pub laundry: f64,
    pub bathroom: f64,
}

/// Threshold fractions of `capacity_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// The pump may only start strictly above this fraction
    pub pump_activation: f64,

    /// The garden only draws strictly above this fraction
    pub garden_gate: f64,

    /// The laundry never takes the tank below this fraction
    pub laundry_floor: f64,
}

/// Cadence and decision bands for the actor loops.
///
/// Periods are expressed in ticks so the whole simulation can be sped up by
/// shrinking `tick_ms` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Length of one tick in milliseconds
    pub tick_ms: u64,

    pub pluvial_ticks: u32,
    pub cisterna_ticks: u32,
    pub garden_ticks: u32,
    pub laundry_ticks: u32,
    pub bathroom_ticks: u32,

    /// Bounded wait of the pump controller on its signal
    pub pump_poll_ticks: u32,

    /// Observer polling interval (the dashboard refreshes twice per second)
    pub observer_interval_ms: u64,

    /// Chance of rain on each pluvial tick (0.0 to 1.0)
    pub rain_probability: f64,

    /// Keep the rain signal raised on dry ticks until cleared externally
    pub sticky_rain: bool,

    /// Cisterna pumps water in below this percentage
    pub cisterna_fill_below_pct: f64,

    /// Cisterna switches the pump off at or above this percentage
    pub cisterna_stop_above_pct: f64,

    /// Pump controller shuts off below this percentage
    pub pump_cutoff_pct: f64,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            capacity_max: 1000.0,
            capacity_min: 100.0,
            initial_level: 300.0,
            flows: FlowConfig::default(),
            draws: DrawConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pluvial: 15.0,
            cisterna: 30.0,
        }
    }
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            garden: 10.0,
            laundry: 8.0,
            bathroom: 5.0,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pump_activation: 0.25,
            garden_gate: 0.5,
            laundry_floor: 0.03,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            pluvial_ticks: 4,
            cisterna_ticks: 3,
            garden_ticks: 5,
            laundry_ticks: 4,
            bathroom_ticks: 3,
            pump_poll_ticks: 1,
            observer_interval_ms: 500,
            rain_probability: 0.2,
            sticky_rain: false,
            cisterna_fill_below_pct: 30.0,
            cisterna_stop_above_pct: 90.0,
            pump_cutoff_pct: 25.0,
        }
    }
}

impl ReservoirConfig {
    /// Reject configurations under which the level invariant cannot hold.
    pub fn validate(&self) -> Result<()> {
        if !(self.capacity_max > 0.0) {
            bail!("capacity_max must be positive, got {}", self.capacity_max);
        }
        if self.capacity_min < 0.0 || self.capacity_min > self.capacity_max {
            bail!(
                "capacity_min must lie in [0, {}], got {}",
                self.capacity_max,
                self.capacity_min
            );
        }
        if !(0.0..=self.capacity_max).contains(&self.initial_level) {
            bail!(
                "initial_level must lie in [0, {}], got {}",
                self.capacity_max,
                self.initial_level
            );
        }

        let amounts = [
            ("flows.pluvial", self.flows.pluvial),
            ("flows.cisterna", self.flows.cisterna),
            ("draws.garden", self.draws.garden),
            ("draws.laundry", self.draws.laundry),
            ("draws.bathroom", self.draws.bathroom),
        ];
        for (name, value) in amounts {
            if !(value >= 0.0) {
                bail!("{} must be non-negative, got {}", name, value);
            }
        }

        let fractions = [
            ("thresholds.pump_activation", self.thresholds.pump_activation),
            ("thresholds.garden_gate", self.thresholds.garden_gate),
            ("thresholds.laundry_floor", self.thresholds.laundry_floor),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must lie in [0, 1], got {}", name, value);
            }
        }

        Ok(())
    }

    /// Level at which the pump becomes eligible to start (exclusive).
    pub fn pump_activation_level(&self) -> f64 {
        self.capacity_max * self.thresholds.pump_activation
    }

    /// Level the garden outlet must exceed before drawing.
    pub fn garden_gate_level(&self) -> f64 {
        self.capacity_max * self.thresholds.garden_gate
    }

    /// Lowest level the laundry outlet may leave behind.
    pub fn laundry_floor_level(&self) -> f64 {
        self.capacity_max * self.thresholds.laundry_floor
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            bail!("tick_ms must be positive");
        }
        let periods = [
            ("pluvial_ticks", self.pluvial_ticks),
            ("cisterna_ticks", self.cisterna_ticks),
            ("garden_ticks", self.garden_ticks),
            ("laundry_ticks", self.laundry_ticks),
            ("bathroom_ticks", self.bathroom_ticks),
            ("pump_poll_ticks", self.pump_poll_ticks),
        ];
        for (name, ticks) in periods {
            if ticks == 0 {
                bail!("{} must be at least 1", name);
            }
        }
        if self.observer_interval_ms == 0 {
            bail!("observer_interval_ms must be positive");
        }
        if !(0.0..=1.0).contains(&self.rain_probability) {
            bail!(
                "rain_probability must lie in [0, 1], got {}",
                self.rain_probability
            );
        }
        if self.cisterna_fill_below_pct > self.cisterna_stop_above_pct {
            bail!(
                "cisterna_fill_below_pct ({}) must not exceed cisterna_stop_above_pct ({})",
                self.cisterna_fill_below_pct,
                self.cisterna_stop_above_pct
            );
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Duration of `ticks` whole ticks.
    pub fn ticks(&self, ticks: u32) -> Duration {
        self.tick() * ticks
    }

    pub fn observer_interval(&self) -> Duration {
        Duration::from_millis(self.observer_interval_ms)
    }
}
