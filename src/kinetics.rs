//! Michaelis-Menten uptake limits and growth inhibition.

use crate::fba::{ExchangeMap, LowerBounds};
use crate::types::Concentrations;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Uptake kinetics of one metabolite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uptake {
    /// Maximum uptake rate.
    pub v_max: f64,
    /// Half-saturation concentration.
    pub k_m: f64,
}

impl Uptake {
    /// Lower bound of the exchange flux at concentration `conc`.
    ///
    /// Lies in `[-v_max, 0]`: zero without substrate, approaching `-v_max` at saturation.
    pub fn lower_bound(&self, conc: f64) -> f64 {
        let conc = conc.max(0.0);
        -self.v_max * conc / (self.k_m + conc)
    }
}

/// Static kinetic parameters of a simulation, keyed by metabolite id.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinetics {
    uptake: BTreeMap<String, Uptake>,
    inhibition: BTreeMap<String, f64>,
}

impl Kinetics {
    /// Create a new [`Kinetics`] from uptake parameters and inhibition constants.
    ///
    /// # Errors
    /// Returns an error if any parameter is not positive and finite.
    pub fn new(uptake: BTreeMap<String, Uptake>, inhibition: BTreeMap<String, f64>) -> Result<Self> {
        for (met, par) in &uptake {
            check_param(par.v_max).with_context(|| format!("invalid v_max of {met:?}"))?;
            check_param(par.k_m).with_context(|| format!("invalid k_m of {met:?}"))?;
        }
        for (met, &k_n) in &inhibition {
            check_param(k_n).with_context(|| format!("invalid k_n of {met:?}"))?;
        }
        Ok(Self { uptake, inhibition })
    }

    /// Dynamic lower bounds of the exchange reactions with uptake kinetics.
    ///
    /// Metabolites absent from `conc` count as depleted.
    ///
    /// # Errors
    /// Returns an error if a metabolite with kinetics has no exchange reaction.
    pub fn uptake_bounds(&self, conc: &Concentrations, exchanges: &ExchangeMap) -> Result<LowerBounds> {
        let mut bounds = LowerBounds::new();
        for (met, par) in &self.uptake {
            let reaction = exchanges
                .get(met)
                .with_context(|| format!("no exchange reaction for {met:?}"))?;
            let c = conc.get(met).copied().unwrap_or(0.0);
            bounds.insert(reaction.clone(), par.lower_bound(c));
        }
        Ok(bounds)
    }

    /// Growth inhibition factor `prod K_n / (K_n + C)` over the inhibitory metabolites.
    ///
    /// Exactly one when no metabolite is inhibitory.
    pub fn inhibition_factor(&self, conc: &Concentrations) -> f64 {
        self.inhibition.iter().fold(1.0, |acc, (met, &k_n)| {
            let c = conc.get(met).copied().unwrap_or(0.0).max(0.0);
            acc * k_n / (k_n + c)
        })
    }
}

fn check_param(val: f64) -> Result<()> {
    if !(val.is_finite() && val > 0.0) {
        bail!("parameter must be positive and finite, but is {val}");
    }
    Ok(())
}
