//! Rain stimulus consumed by the pluvial actor.
//!
//! The weather is outside the tank's rules, so it is injected through
//! [`RainStimulus`]. The pluvial actor asks the stimulus once per tick and
//! applies the decision to the reservoir's rain signal.

use std::collections::VecDeque;

use rand::prelude::*;

/// What the stimulus wants done with the rain signal this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainDecision {
    Raise,
    Clear,
    /// Leave the signal as it is (e.g. manual rain stays on)
    Keep,
}

pub trait RainStimulus: Send {
    fn next(&mut self) -> RainDecision;
}

/// Rain with a fixed chance per tick.
///
/// Non-sticky rain clears on every dry tick. Sticky rain only ever raises
/// the signal, leaving it to an external toggle to stop it.
pub struct RandomRain {
    probability: f64,
    sticky: bool,
    rng: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for RandomRain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomRain")
            .field("probability", &self.probability)
            .field("sticky", &self.sticky)
            .finish()
    }
}

impl RandomRain {
    /// `seed = None` draws from the thread-local generator's entropy.
    pub fn new(probability: f64, sticky: bool, seed: Option<u64>) -> Self {
        let rng: Box<dyn RngCore + Send> = match seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_rng(&mut rand::rng())),
        };
        Self {
            probability: probability.clamp(0.0, 1.0),
            sticky,
            rng,
        }
    }
}

impl RainStimulus for RandomRain {
    fn next(&mut self) -> RainDecision {
        if self.rng.random::<f64>() < self.probability {
            RainDecision::Raise
        } else if self.sticky {
            RainDecision::Keep
        } else {
            RainDecision::Clear
        }
    }
}

/// Replays a fixed list of decisions, then keeps the signal unchanged.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRain {
    script: VecDeque<RainDecision>,
}

impl ScriptedRain {
    pub fn new(script: impl IntoIterator<Item = RainDecision>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl RainStimulus for ScriptedRain {
    fn next(&mut self) -> RainDecision {
        self.script.pop_front().unwrap_or(RainDecision::Keep)
    }
}
