use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::fba::FluxModel;
use crate::network::Network;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory: a `config.toml` plus one `run-NNNN` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Load the metabolic network named by the configuration.
    pub fn load_network(&self) -> Result<Network> {
        let model_file = self.sim_dir.join(&self.cfg.model.file);
        let mut network = Network::from_file(&model_file)
            .with_context(|| format!("failed to load {model_file:?}"))?;
        log::info!(
            "loaded model {:?} with {} reactions and {} exchanges",
            network.id(),
            network.n_reactions(),
            network.exchanges().len()
        );

        if let Some(reaction) = &self.cfg.model.biomass_reaction {
            network
                .set_objective(reaction)
                .context("failed to set biomass objective")?;
        }
        network.open_exchanges(&self.cfg.model.essential_exchanges);

        Ok(network)
    }

    pub fn create_run(&self) -> Result<()> {
        let network = self.load_network().context("failed to load network")?;
        let mut engine = Engine::new(&self.cfg, network).context("failed to construct engine")?;

        engine.run().context("failed to run simulation")?;
        let trajectory = engine.into_trajectory()?;

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        trajectory
            .history
            .write_csv(self.history_file(run_idx), self.cfg.output.steps_per_save)
            .context("failed to write history")?;
        trajectory
            .save(self.trajectory_file(run_idx))
            .context("failed to save trajectory")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let trajectory_file = self.trajectory_file(run_idx);
            let analyzer = Analyzer::from_file(&trajectory_file)
                .with_context(|| format!("failed to analyze {trajectory_file:?}"))?;

            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;
            log::info!("analyzed run {run_idx}");
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir).with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn history_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("history.csv")
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.json")
    }
}
