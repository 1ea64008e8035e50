use crate::control::SetpointBand;
use crate::kinetics::Uptake;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug, fs, ops::RangeBounds, path::Path, path::PathBuf};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default)]
    pub kinetics: KineticsConfig,
    pub init: InitConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Metabolic model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// COBRA JSON model file, relative to the simulation directory.
    pub file: PathBuf,
    /// Reaction optimized as growth (the model objective if absent).
    #[serde(default)]
    pub biomass_reaction: Option<String>,
    /// Exchanges opened to `[-1000, 1000]` and excluded from default kinetics.
    #[serde(default = "default_essential_exchanges")]
    pub essential_exchanges: Vec<String>,
}

/// Kinetic parameters, keyed by extracellular metabolite id.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct KineticsConfig {
    /// Uptake kinetics of individual metabolites.
    #[serde(default)]
    pub uptake: BTreeMap<String, Uptake>,
    /// Uptake kinetics of the remaining non-essential exchanges (model bounds if absent).
    #[serde(default)]
    pub default_uptake: Option<Uptake>,
    /// Inhibition constants of growth-inhibiting metabolites.
    #[serde(default)]
    pub inhibition: BTreeMap<String, f64>,
}

/// Initial condition.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub biomass: f64,
    /// Culture volume.
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Initial concentrations (unlisted exchange metabolites start at zero).
    #[serde(default)]
    pub concentrations: BTreeMap<String, f64>,
}

/// Time stepping parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Time step, in the time unit of the model fluxes.
    pub dt: f64,
    /// Maximum number of steps.
    pub n_steps: usize,
    /// Simulated time at which to stop, if reached before `n_steps`.
    #[serde(default)]
    pub horizon: Option<f64>,
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub setpoints: Vec<SetpointBand>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps between rows of the history table.
    #[serde(default = "default_steps_per_save")]
    pub steps_per_save: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            steps_per_save: default_steps_per_save(),
        }
    }
}

fn default_essential_exchanges() -> Vec<String> {
    [
        "EX_nh4_e", "EX_pi_e", "EX_h_e", "EX_h2o_e", "EX_k_e", "EX_na1_e", "EX_cl_e", "EX_mg2_e",
        "EX_ca2_e", "EX_fe2_e",
    ]
    .map(String::from)
    .to_vec()
}

fn default_volume() -> f64 {
    1.0
}

fn default_steps_per_save() -> usize {
    1
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let string = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&string)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(string: &str) -> Result<Self> {
        let config: Config = toml::from_str(string).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(reaction) = &self.model.biomass_reaction {
            check_id(reaction).context("invalid biomass reaction")?;
        }

        for (met, par) in &self.kinetics.uptake {
            check_positive(par.v_max).with_context(|| format!("invalid v_max of {met:?}"))?;
            check_positive(par.k_m).with_context(|| format!("invalid k_m of {met:?}"))?;
        }
        if let Some(par) = &self.kinetics.default_uptake {
            check_positive(par.v_max).context("invalid default v_max")?;
            check_positive(par.k_m).context("invalid default k_m")?;
        }
        for (met, &k_n) in &self.kinetics.inhibition {
            check_positive(k_n).with_context(|| format!("invalid k_n of {met:?}"))?;
        }

        check_non_negative(self.init.biomass).context("invalid initial biomass")?;
        check_positive(self.init.volume).context("invalid volume")?;
        for (met, &c) in &self.init.concentrations {
            check_non_negative(c).with_context(|| format!("invalid initial concentration of {met:?}"))?;
        }

        check_positive(self.run.dt).context("invalid time step")?;
        check_num(self.run.n_steps, 1..100_000_000).context("invalid number of steps")?;
        if let Some(horizon) = self.run.horizon {
            check_positive(horizon).context("invalid horizon")?;
        }

        for band in &self.control.setpoints {
            band.validate()
                .with_context(|| format!("invalid setpoint band of {:?}", band.metabolite))?;
        }

        check_num(self.output.steps_per_save, 1..1_000_000).context("invalid number of steps per save")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_positive(num: f64) -> Result<()> {
    if !(num.is_finite() && num > 0.0) {
        bail!("number must be positive and finite, but is {num}");
    }
    Ok(())
}

fn check_non_negative(num: f64) -> Result<()> {
    if !(num.is_finite() && num >= 0.0) {
        bail!("number must be non-negative and finite, but is {num}");
    }
    Ok(())
}

fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("identifier must not be empty");
    }
    Ok(())
}
