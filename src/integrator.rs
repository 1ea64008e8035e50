//! Explicit Euler update of biomass and extracellular concentrations.
//!
//! First-order and unconditionally explicit: accuracy and stability are controlled
//! only through the step size. A large step with a negative growth rate can drive
//! biomass below zero; it is floored and flagged instead of silently adapted.

use crate::types::{Concentrations, State};

/// Result of advancing the state by one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub state: State,
    /// Biomass was floored at zero.
    pub biomass_floored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    dt: f64,
    volume: f64,
}

impl Integrator {
    pub fn new(dt: f64, volume: f64) -> Self {
        Self { dt, volume }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Advance `state` by one step.
    ///
    /// `fluxes` maps metabolite id -> exchange flux per unit biomass; tracked metabolites
    /// without a flux are left unchanged. Time is not advanced here.
    pub fn step(
        &self,
        state: &State,
        growth_rate: f64,
        inhibition: f64,
        fluxes: &Concentrations,
    ) -> Advance {
        let biomass = state.biomass;

        let concentrations = state
            .concentrations
            .iter()
            .map(|(met, &c)| {
                let flux = fluxes.get(met).copied().unwrap_or(0.0);
                let c_new = c + flux * biomass * self.dt / self.volume;
                (met.clone(), c_new.max(0.0))
            })
            .collect();

        let mut biomass_new = biomass * (1.0 + inhibition * growth_rate * self.dt);
        let biomass_floored = biomass_new < 0.0;
        if biomass_floored {
            biomass_new = 0.0;
        }

        Advance {
            state: State {
                time: state.time,
                biomass: biomass_new,
                concentrations,
            },
            biomass_floored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(biomass: f64, pairs: &[(&str, f64)]) -> State {
        State {
            time: 0.0,
            biomass,
            concentrations: pairs.iter().map(|&(m, c)| (m.to_string(), c)).collect(),
        }
    }

    fn fluxes(pairs: &[(&str, f64)]) -> Concentrations {
        pairs.iter().map(|&(m, f)| (m.to_string(), f)).collect()
    }

    #[test]
    fn euler_update() {
        let integ = Integrator::new(0.5, 2.0);
        let adv = integ.step(
            &state(2.0, &[("glc_e", 10.0), ("ac_e", 1.0)]),
            0.4,
            0.5,
            &fluxes(&[("glc_e", -4.0), ("ac_e", 1.0)]),
        );
        // 2 * (1 + 0.5 * 0.4 * 0.5)
        assert!((adv.state.biomass - 2.2).abs() < 1e-12);
        // 10 - 4 * 2 * 0.5 / 2
        assert!((adv.state.concentrations["glc_e"] - 8.0).abs() < 1e-12);
        assert!((adv.state.concentrations["ac_e"] - 1.5).abs() < 1e-12);
        assert!(!adv.biomass_floored);
    }

    #[test]
    fn concentrations_are_clamped_at_zero() {
        let integ = Integrator::new(1.0, 1.0);
        for flux in [-0.1, -1.0, -10.0, -1e6] {
            let adv = integ.step(&state(3.0, &[("glc_e", 0.5)]), 0.1, 1.0, &fluxes(&[("glc_e", flux)]));
            assert!(adv.state.concentrations["glc_e"] >= 0.0);
        }
        let adv = integ.step(&state(3.0, &[("glc_e", 0.5)]), 0.1, 1.0, &fluxes(&[("glc_e", -1e6)]));
        assert_eq!(adv.state.concentrations["glc_e"], 0.0);
    }

    #[test]
    fn secretion_from_empty_medium() {
        let integ = Integrator::new(0.1, 1.0);
        let adv = integ.step(&state(1.0, &[("ac_e", 0.0)]), 0.2, 1.0, &fluxes(&[("ac_e", 2.0)]));
        assert!(adv.state.concentrations["ac_e"] > 0.0);

        let adv = integ.step(&state(1.0, &[("ac_e", 0.0)]), 0.2, 1.0, &fluxes(&[("ac_e", 0.0)]));
        assert_eq!(adv.state.concentrations["ac_e"], 0.0);
    }

    #[test]
    fn missing_flux_leaves_concentration() {
        let integ = Integrator::new(0.1, 1.0);
        let adv = integ.step(&state(1.0, &[("o2_e", 0.25)]), 0.2, 1.0, &Concentrations::new());
        assert_eq!(adv.state.concentrations["o2_e"], 0.25);
    }

    #[test]
    fn negative_biomass_is_floored_and_flagged() {
        let integ = Integrator::new(10.0, 1.0);
        let adv = integ.step(&state(1.0, &[]), -0.5, 1.0, &Concentrations::new());
        assert_eq!(adv.state.biomass, 0.0);
        assert!(adv.biomass_floored);
    }
}
