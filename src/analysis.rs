use crate::history::Trajectory;
use crate::stats::Accumulator;
use crate::types::{Concentrations, Record, State};
use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs::File, io::BufWriter, path::Path};

pub trait Obs {
    fn update(&mut self, rec: &Record) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

pub struct Biomass {
    initial: f64,
    acc: Accumulator,
}

impl Biomass {
    pub fn new(initial: &State) -> Self {
        Self {
            initial: initial.biomass,
            acc: Accumulator::new(),
        }
    }
}

impl Obs for Biomass {
    fn update(&mut self, rec: &Record) -> Result<()> {
        self.acc.add(rec.biomass);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let report = self.acc.report();
        let last = if report.n_vals == 0 { self.initial } else { report.last };
        serde_json::json!({
            "biomass": {
                "initial": self.initial,
                "final": last,
                "max": report.max.max(self.initial),
                "fold_change": last / self.initial,
            }
        })
    }
}

/// Effective growth rate, the optimal objective scaled by inhibition.
pub struct GrowthRate {
    acc: Accumulator,
    n_floored: usize,
}

impl GrowthRate {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
            n_floored: 0,
        }
    }
}

impl Obs for GrowthRate {
    fn update(&mut self, rec: &Record) -> Result<()> {
        self.acc.add(rec.growth_rate * rec.inhibition);
        if rec.biomass_floored {
            self.n_floored += 1;
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let report = self.acc.report();
        serde_json::json!({
            "growth_rate": {
                "mean": report.mean,
                "std_dev": report.std_dev,
                "max": report.max,
                "n_biomass_floored": self.n_floored,
            }
        })
    }
}

pub struct Concentration {
    initial: Concentrations,
    acc_map: BTreeMap<String, Accumulator>,
}

impl Concentration {
    pub fn new(initial: &State) -> Self {
        let mut acc_map = BTreeMap::new();
        for (met, &c) in &initial.concentrations {
            let mut acc = Accumulator::new();
            acc.add(c);
            acc_map.insert(met.clone(), acc);
        }
        Self {
            initial: initial.concentrations.clone(),
            acc_map,
        }
    }
}

impl Obs for Concentration {
    fn update(&mut self, rec: &Record) -> Result<()> {
        for (met, &c) in &rec.concentrations {
            self.acc_map
                .get_mut(met)
                .with_context(|| format!("record has untracked metabolite {met:?}"))?
                .add(c);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: serde_json::Map<_, _> = self
            .acc_map
            .iter()
            .map(|(met, acc)| {
                let report = acc.report();
                let report = serde_json::json!({
                    "initial": self.initial[met],
                    "final": report.last,
                    "min": report.min,
                    "max": report.max,
                });
                (met.clone(), report)
            })
            .collect();
        serde_json::json!({ "concentrations": reports })
    }
}

pub struct Analyzer {
    trajectory: Trajectory,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(trajectory: Trajectory) -> Result<Self> {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(Biomass::new(&trajectory.initial)));
        obs_ptr_vec.push(Box::new(GrowthRate::new()));
        obs_ptr_vec.push(Box::new(Concentration::new(&trajectory.initial)));

        for rec in trajectory.history.records() {
            for obs in &mut obs_ptr_vec {
                obs.update(rec).context("failed to update observable")?;
            }
        }

        Ok(Self {
            trajectory,
            obs_ptr_vec,
        })
    }

    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let trajectory = Trajectory::load(file).context("failed to load trajectory")?;
        Self::new(trajectory)
    }

    pub fn report(&self) -> serde_json::Value {
        let history = &self.trajectory.history;
        let final_time = history
            .records()
            .last()
            .map_or(self.trajectory.initial.time, |rec| rec.time);
        let mut reports = vec![serde_json::json!({
            "run": {
                "halt_reason": self.trajectory.halt_reason.to_string(),
                "n_steps": history.len(),
                "final_time": final_time,
            }
        })];
        reports.extend(self.obs_ptr_vec.iter().map(|obs| obs.report()));
        serde_json::Value::Array(reports)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.report()).context("failed to serialize results")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::types::HaltReason;

    fn trajectory() -> Trajectory {
        let mut history = History::new(vec!["glc_e".to_string()], vec!["EX_glc_e".to_string()]);
        for (step, (biomass, glc)) in [(1.5, 8.0), (2.0, 5.0), (2.5, 1.0)].into_iter().enumerate() {
            history.push(Record {
                time: step as f64,
                biomass,
                concentrations: BTreeMap::from([("glc_e".to_string(), glc)]),
                growth_rate: 0.5,
                inhibition: 0.8,
                fluxes: BTreeMap::from([("EX_glc_e".to_string(), -3.0)]),
                biomass_floored: false,
            });
        }
        Trajectory {
            initial: State {
                time: 0.0,
                biomass: 1.0,
                concentrations: BTreeMap::from([("glc_e".to_string(), 10.0)]),
            },
            halt_reason: HaltReason::Infeasible,
            history,
        }
    }

    #[test]
    fn reports_run_summary() {
        let report = Analyzer::new(trajectory()).expect("failed to analyze").report();
        assert_eq!(report[0]["run"]["halt_reason"], "infeasible");
        assert_eq!(report[0]["run"]["n_steps"], 3);
        assert_eq!(report[0]["run"]["final_time"], 2.0);

        assert_eq!(report[1]["biomass"]["initial"], 1.0);
        assert_eq!(report[1]["biomass"]["final"], 2.5);
        assert_eq!(report[1]["biomass"]["fold_change"], 2.5);

        assert_eq!(report[2]["growth_rate"]["max"], 0.4);
        assert_eq!(report[2]["growth_rate"]["n_biomass_floored"], 0);

        let glc = &report[3]["concentrations"]["glc_e"];
        assert_eq!(glc["initial"], 10.0);
        assert_eq!(glc["final"], 1.0);
        assert_eq!(glc["min"], 1.0);
        assert_eq!(glc["max"], 10.0);
    }

    #[test]
    fn empty_history_reports_initial_state() {
        let mut traj = trajectory();
        traj.history = History::new(vec!["glc_e".to_string()], vec!["EX_glc_e".to_string()]);
        let report = Analyzer::new(traj).expect("failed to analyze").report();
        assert_eq!(report[0]["run"]["n_steps"], 0);
        assert_eq!(report[1]["biomass"]["final"], 1.0);
        assert_eq!(report[3]["concentrations"]["glc_e"]["final"], 10.0);
    }
}
