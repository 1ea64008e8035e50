//! Dynamic flux balance analysis.
//!
//! A batch culture is advanced in explicit Euler steps. At every step Michaelis-Menten
//! kinetics turn the extracellular concentrations into uptake bounds, a flux balance
//! problem yields the growth rate and exchange fluxes, and the integrator updates
//! biomass and concentrations. The run halts when the step budget is exhausted or the
//! flux balance problem becomes infeasible.

pub mod analysis;
pub mod config;
pub mod control;
pub mod engine;
pub mod fba;
pub mod history;
pub mod integrator;
pub mod kinetics;
pub mod manager;
pub mod network;
pub mod simplex;
pub mod stats;
pub mod types;
