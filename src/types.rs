//! Simulation data types.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Metabolite id -> extracellular concentration.
pub type Concentrations = BTreeMap<String, f64>;

/// State of the culture at a given time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Simulated time.
    pub time: f64,

    /// Biomass.
    pub biomass: f64,

    /// Concentration of every tracked extracellular metabolite.
    pub concentrations: Concentrations,
}

/// Why a simulation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The flux balance problem had no feasible solution.
    Infeasible,
    /// The step budget or time horizon was exhausted.
    StepLimit,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Infeasible => f.write_str("infeasible"),
            HaltReason::StepLimit => f.write_str("step_limit"),
        }
    }
}

/// Record of the simulation at a single step.
///
/// `time` is the start of the step; biomass and concentrations are the values at its end,
/// reached with `growth_rate`, `inhibition` and `fluxes` held over the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub time: f64,

    pub biomass: f64,

    pub concentrations: Concentrations,

    /// Optimal objective of the flux balance problem.
    pub growth_rate: f64,

    /// Multiplicative growth inhibition in (0, 1].
    pub inhibition: f64,

    /// Exchange reaction id -> flux.
    pub fluxes: BTreeMap<String, f64>,

    /// Biomass would have turned negative and was floored at zero.
    pub biomass_floored: bool,
}
