//! Pre-step overrides of the culture state.
//!
//! Controllers are modeled as instantaneous: the override is applied before kinetics
//! read the state and again to the integrated state before it is recorded, with no
//! dynamics of its own.

use crate::types::State;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub trait StateOverride {
    fn apply(&self, state: &mut State);
}

/// Keeps the concentration of one metabolite inside `[min, max]`.
///
/// A band with `min == max` holds the metabolite at a fixed setpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointBand {
    pub metabolite: String,
    pub min: f64,
    pub max: f64,
}

impl SetpointBand {
    pub fn validate(&self) -> Result<()> {
        let (min, max) = (self.min, self.max);
        if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
            bail!("band must satisfy 0 <= min <= max, but is [{min}, {max}]");
        }
        Ok(())
    }
}

impl StateOverride for SetpointBand {
    fn apply(&self, state: &mut State) {
        if let Some(c) = state.concentrations.get_mut(&self.metabolite) {
            *c = c.clamp(self.min, self.max);
        }
    }
}
