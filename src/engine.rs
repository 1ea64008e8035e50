use crate::config::Config;
use crate::control::StateOverride;
use crate::fba::{FluxModel, Solution};
use crate::history::{History, Trajectory};
use crate::integrator::{Advance, Integrator};
use crate::kinetics::Kinetics;
use crate::types::{Concentrations, HaltReason, Record, State};
use anyhow::{Context, Result, bail};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle of an [`Engine`]. `Halted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted(HaltReason),
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halt(HaltReason),
}

/// Dynamic FBA simulation engine.
///
/// Holds the flux model, the static kinetics, the current state and the history,
/// and alternates kinetics, flux balance solves and Euler steps until it halts.
pub struct Engine<M: FluxModel> {
    model: M,
    kinetics: Kinetics,
    integrator: Integrator,
    overrides: Vec<Box<dyn StateOverride>>,
    initial: State,
    state: State,
    history: History,
    n_steps: usize,
    horizon: Option<f64>,
    i_step: usize,
    status: Status,
}

impl<M: FluxModel> Engine<M> {
    /// Create a new `Engine` at the initial condition of `cfg`.
    ///
    /// Every exchange metabolite of `model` is tracked.
    ///
    /// # Errors
    /// Returns an error if the configuration values are invalid, if they refer to
    /// metabolites without an exchange reaction or if any kinetic parameter is invalid.
    pub fn new(cfg: &Config, model: M) -> Result<Self> {
        cfg.validate().context("invalid config")?;

        let exchanges = model.exchanges();

        for met in cfg.init.concentrations.keys() {
            if !exchanges.contains_key(met) {
                bail!("initial concentration given for {met:?}, which has no exchange reaction");
            }
        }
        let concentrations: Concentrations = exchanges
            .keys()
            .map(|met| (met.clone(), cfg.init.concentrations.get(met).copied().unwrap_or(0.0)))
            .collect();

        let mut uptake = BTreeMap::new();
        for (met, &par) in &cfg.kinetics.uptake {
            if !exchanges.contains_key(met) {
                bail!("uptake kinetics given for {met:?}, which has no exchange reaction");
            }
            uptake.insert(met.clone(), par);
        }
        if let Some(par) = cfg.kinetics.default_uptake {
            let essential: BTreeSet<_> = cfg.model.essential_exchanges.iter().collect();
            for (met, reaction) in exchanges {
                if !essential.contains(reaction) {
                    uptake.entry(met.clone()).or_insert(par);
                }
            }
        }

        for met in cfg.kinetics.inhibition.keys() {
            if !exchanges.contains_key(met) {
                bail!("inhibition constant given for {met:?}, which is not tracked");
            }
        }

        let mut overrides: Vec<Box<dyn StateOverride>> = Vec::new();
        for band in &cfg.control.setpoints {
            if !exchanges.contains_key(&band.metabolite) {
                bail!("setpoint given for {:?}, which is not tracked", band.metabolite);
            }
            overrides.push(Box::new(band.clone()));
        }

        let kinetics = Kinetics::new(uptake, cfg.kinetics.inhibition.clone())
            .context("failed to construct kinetics")?;
        log::debug!("{kinetics:#?}");

        let history = History::new(
            exchanges.keys().cloned().collect(),
            exchanges.values().cloned().collect(),
        );

        let state = State {
            time: 0.0,
            biomass: cfg.init.biomass,
            concentrations,
        };

        Ok(Self {
            model,
            kinetics,
            integrator: Integrator::new(cfg.run.dt, cfg.init.volume),
            overrides,
            initial: state.clone(),
            state,
            history,
            n_steps: cfg.run.n_steps,
            horizon: cfg.run.horizon,
            i_step: 0,
            status: Status::Running,
        })
    }

    /// Register an additional pre-step override, applied after the configured ones.
    pub fn add_override(&mut self, ovr: Box<dyn StateOverride>) {
        self.overrides.push(ovr);
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run steps until the engine halts and return the reason.
    pub fn run(&mut self) -> Result<HaltReason> {
        let n_report = (self.n_steps / 10).max(1);
        loop {
            match self.step().context("failed to perform step")? {
                StepOutcome::Continue => {
                    if self.i_step % n_report == 0 {
                        let progress = 100.0 * self.i_step as f64 / self.n_steps as f64;
                        log::info!(
                            "completed {progress:06.2}% (t = {:.4}, biomass = {:.4})",
                            self.state.time,
                            self.state.biomass
                        );
                    }
                }
                StepOutcome::Halt(reason) => {
                    log::info!(
                        "halted ({reason}) after {} steps at t = {:.4}, final biomass = {:.4}",
                        self.i_step,
                        self.state.time,
                        self.state.biomass
                    );
                    return Ok(reason);
                }
            }
        }
    }

    /// Perform one step.
    ///
    /// # Errors
    /// Returns an error if the engine has already halted or if the flux model fails.
    /// An infeasible flux balance problem halts the engine instead.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if let Status::Halted(reason) = self.status {
            bail!("engine already halted ({reason})");
        }

        for ovr in &self.overrides {
            ovr.apply(&mut self.state);
        }

        let bounds = self
            .kinetics
            .uptake_bounds(&self.state.concentrations, self.model.exchanges())
            .context("failed to compute uptake bounds")?;

        let (growth_rate, fluxes) = match self
            .model
            .optimize(&bounds)
            .context("failed to optimize flux model")?
        {
            Solution::Optimal { objective, fluxes } => (objective, fluxes),
            Solution::Infeasible => {
                log::warn!("flux balance problem infeasible at t = {}", self.state.time);
                return Ok(self.halt(HaltReason::Infeasible));
            }
        };

        let inhibition = self.kinetics.inhibition_factor(&self.state.concentrations);

        // Exchange fluxes keyed by the metabolite they carry.
        let mut met_fluxes = Concentrations::new();
        let mut rxn_fluxes = BTreeMap::new();
        for (met, reaction) in self.model.exchanges() {
            let &flux = fluxes
                .get(reaction)
                .with_context(|| format!("solution has no flux for {reaction:?}"))?;
            met_fluxes.insert(met.clone(), flux);
            rxn_fluxes.insert(reaction.clone(), flux);
        }

        let Advance {
            mut state,
            biomass_floored,
        } = self
            .integrator
            .step(&self.state, growth_rate, inhibition, &met_fluxes);
        if biomass_floored {
            log::warn!(
                "biomass turned negative at t = {} and was floored at zero, consider a smaller time step",
                self.state.time
            );
        }

        // Held metabolites are recorded at their setpoint.
        for ovr in &self.overrides {
            ovr.apply(&mut state);
        }

        self.history.push(Record {
            time: self.state.time,
            biomass: state.biomass,
            concentrations: state.concentrations.clone(),
            growth_rate,
            inhibition,
            fluxes: rxn_fluxes,
            biomass_floored,
        });

        self.i_step += 1;
        self.state = state;
        self.state.time = self.i_step as f64 * self.integrator.dt();

        let horizon_reached = self
            .horizon
            .is_some_and(|horizon| self.state.time >= horizon - 1e-9 * self.integrator.dt());
        if self.i_step >= self.n_steps || horizon_reached {
            return Ok(self.halt(HaltReason::StepLimit));
        }

        Ok(StepOutcome::Continue)
    }

    /// Consume the engine into its trajectory.
    ///
    /// # Errors
    /// Returns an error if the engine has not halted.
    pub fn into_trajectory(self) -> Result<Trajectory> {
        let Status::Halted(halt_reason) = self.status else {
            bail!("engine is still running");
        };
        Ok(Trajectory {
            initial: self.initial,
            halt_reason,
            history: self.history,
        })
    }

    fn halt(&mut self, reason: HaltReason) -> StepOutcome {
        self.status = Status::Halted(reason);
        StepOutcome::Halt(reason)
    }
}
