use crate::types::{HaltReason, Record, State};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Append-only sequence of step records.
///
/// Also fixes the column layout of the history table:
/// the tracked metabolites and exchange reactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    metabolites: Vec<String>,
    reactions: Vec<String>,
    records: Vec<Record>,
}

impl History {
    pub fn new(metabolites: Vec<String>, reactions: Vec<String>) -> Self {
        Self {
            metabolites,
            reactions,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write every `steps_per_save`-th record as a CSV row, always including the last one.
    ///
    /// Columns: time, biomass, one per metabolite, growth_rate, one per exchange flux.
    pub fn write_csv<P: AsRef<Path>>(&self, file: P, steps_per_save: usize) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let mut header = vec!["time", "biomass"];
        header.extend(self.metabolites.iter().map(String::as_str));
        header.push("growth_rate");
        header.extend(self.reactions.iter().map(String::as_str));
        writer.write_record(&header).context("failed to write header")?;

        let n_records = self.records.len();
        for (i_rec, rec) in self.records.iter().enumerate() {
            if (i_rec + 1) % steps_per_save != 0 && i_rec + 1 != n_records {
                continue;
            }
            let mut row = vec![rec.time, rec.biomass];
            row.extend(
                self.metabolites
                    .iter()
                    .map(|met| rec.concentrations.get(met).copied().unwrap_or(f64::NAN)),
            );
            row.push(rec.growth_rate);
            row.extend(
                self.reactions
                    .iter()
                    .map(|rxn| rec.fluxes.get(rxn).copied().unwrap_or(f64::NAN)),
            );
            writer
                .write_record(row.iter().map(|val| val.to_string()))
                .context("failed to write record")?;
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }
}

/// Complete outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub initial: State,
    pub halt_reason: HaltReason,
    pub history: History,
}

impl Trajectory {
    /// Save the trajectory to a MessagePack file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize trajectory")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved trajectory.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let trajectory = decode::from_read(&mut reader).context("failed to deserialize trajectory")?;
        Ok(trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeMap, env, fs, path::PathBuf};

    fn record(step: usize) -> Record {
        Record {
            time: step as f64 * 0.5,
            biomass: 1.0 + step as f64,
            concentrations: BTreeMap::from([("glc_e".to_string(), 10.0 - step as f64)]),
            growth_rate: 0.25,
            inhibition: 1.0,
            fluxes: BTreeMap::from([("EX_glc_e".to_string(), -2.0)]),
            biomass_floored: false,
        }
    }

    fn history(n_records: usize) -> History {
        let mut hist = History::new(vec!["glc_e".to_string()], vec!["EX_glc_e".to_string()]);
        for step in 0..n_records {
            hist.push(record(step));
        }
        hist
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join("dfba-history-tests").join(name);
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).expect("failed to create test directory");
        dir
    }

    #[test]
    fn preserves_insertion_order() {
        let hist = history(4);
        assert_eq!(hist.len(), 4);
        let times: Vec<_> = hist.records().iter().map(|rec| rec.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn writes_thinned_csv() {
        let dir = test_dir("history_csv");
        let file = dir.join("history.csv");
        history(5).write_csv(&file, 2).expect("failed to write csv");

        let contents = fs::read_to_string(&file).expect("failed to read csv");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines[0], "time,biomass,glc_e,growth_rate,EX_glc_e");
        assert_eq!(lines[1], "0.5,2,9,0.25,-2");
        assert_eq!(lines[2], "1.5,4,7,0.25,-2");
        assert_eq!(lines[3], "2,5,6,0.25,-2");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn empty_history_still_has_header() {
        let dir = test_dir("history_empty_csv");
        let file = dir.join("history.csv");
        history(0).write_csv(&file, 1).expect("failed to write csv");
        let contents = fs::read_to_string(&file).expect("failed to read csv");
        assert_eq!(contents.trim_end(), "time,biomass,glc_e,growth_rate,EX_glc_e");
    }

    #[test]
    fn trajectory_survives_save_and_load() {
        let dir = test_dir("trajectory");
        let file = dir.join("trajectory.msgpack");
        let traj = Trajectory {
            initial: State {
                time: 0.0,
                biomass: 1.0,
                concentrations: BTreeMap::from([("glc_e".to_string(), 10.0)]),
            },
            halt_reason: HaltReason::Infeasible,
            history: history(3),
        };
        traj.save(&file).expect("failed to save trajectory");
        assert_eq!(Trajectory::load(&file).expect("failed to load trajectory"), traj);
    }
}
