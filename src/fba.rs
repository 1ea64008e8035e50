//! Flux balance analysis boundary.
//!
//! The simulation only needs a metabolic model as a capability: report its exchange
//! reactions and optimize under a set of lower-bound overrides. Any LP backend that
//! implements [`FluxModel`] can drive an [`Engine`](crate::engine::Engine).

use anyhow::Result;
use std::collections::BTreeMap;

/// Extracellular metabolite id -> id of the exchange reaction that carries it.
pub type ExchangeMap = BTreeMap<String, String>;

/// Reaction id -> lower bound, applied on top of the model's own bounds for one solve.
pub type LowerBounds = BTreeMap<String, f64>;

/// Reaction id -> flux (signed, negative means uptake for exchanges).
pub type Fluxes = BTreeMap<String, f64>;

/// Outcome of one flux balance solve.
#[derive(Debug, Clone, PartialEq)]
pub enum Solution {
    /// Optimal solution: objective value (the growth rate) and exchange fluxes.
    Optimal { objective: f64, fluxes: Fluxes },
    /// No flux distribution satisfies the bounds.
    Infeasible,
}

/// Metabolic model that can be optimized under dynamic bounds.
pub trait FluxModel {
    /// Exchange reactions of the model, keyed by their extracellular metabolite.
    fn exchanges(&self) -> &ExchangeMap;

    /// Optimize the objective with `bounds` overriding the lower bounds of the named reactions.
    ///
    /// The overrides only apply to this call; reactions not named keep the model defaults.
    /// Infeasibility is reported through [`Solution::Infeasible`], never as an error.
    fn optimize(&mut self, bounds: &LowerBounds) -> Result<Solution>;
}
