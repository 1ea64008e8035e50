use crate::fba::{ExchangeMap, FluxModel, Fluxes, LowerBounds, Solution};
use crate::simplex::{LinearProgram, LpOutcome};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::Path,
};

/// Bound magnitude given to essential exchanges.
const OPEN_BOUND: f64 = 1000.0;

/// Metabolite entry of a COBRA JSON model.
#[derive(Debug, Deserialize)]
struct MetaboliteEntry {
    id: String,
    #[serde(default)]
    compartment: Option<String>,
}

/// Reaction entry of a COBRA JSON model.
#[derive(Debug, Deserialize)]
struct ReactionEntry {
    id: String,
    metabolites: BTreeMap<String, f64>,
    lower_bound: f64,
    upper_bound: f64,
    #[serde(default)]
    objective_coefficient: f64,
}

/// COBRA JSON model document. Fields not needed for FBA are ignored.
#[derive(Debug, Deserialize)]
struct ModelDocument {
    #[serde(default)]
    id: Option<String>,
    metabolites: Vec<MetaboliteEntry>,
    reactions: Vec<ReactionEntry>,
}

/// Stoichiometric network solved with the in-crate simplex.
///
/// Holds the default bounds of every reaction. Solving never changes them:
/// dynamic bounds are applied to a copy of the linear program for each call.
#[derive(Debug, Clone)]
pub struct Network {
    id: String,
    reaction_ids: Vec<String>,
    reaction_idx: BTreeMap<String, usize>,
    exchanges: ExchangeMap,
    lp: LinearProgram,
}

impl Network {
    /// Load a [`Network`] from a COBRA JSON model file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the model is inconsistent.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);

        let doc: ModelDocument =
            serde_json::from_reader(reader).context("failed to deserialize model")?;

        Self::from_document(doc)
    }

    /// Parse a [`Network`] from a COBRA JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ModelDocument = serde_json::from_str(json).context("failed to deserialize model")?;
        Self::from_document(doc)
    }

    fn from_document(doc: ModelDocument) -> Result<Self> {
        let mut met_idx = BTreeMap::new();
        let mut extracellular = BTreeSet::new();
        for met in &doc.metabolites {
            if met_idx.insert(met.id.clone(), met_idx.len()).is_some() {
                bail!("duplicate metabolite {:?}", met.id);
            }
            let is_ext = match &met.compartment {
                Some(comp) => comp == "e",
                None => met.id.ends_with("_e"),
            };
            if is_ext {
                extracellular.insert(met.id.clone());
            }
        }

        let n_rxn = doc.reactions.len();
        let mut reaction_ids = Vec::with_capacity(n_rxn);
        let mut reaction_idx = BTreeMap::new();
        let mut exchanges = ExchangeMap::new();
        let mut rows = vec![Vec::new(); met_idx.len()];
        let mut lower = Vec::with_capacity(n_rxn);
        let mut upper = Vec::with_capacity(n_rxn);
        let mut objective = Vec::with_capacity(n_rxn);

        for (j, rxn) in doc.reactions.into_iter().enumerate() {
            if reaction_idx.insert(rxn.id.clone(), j).is_some() {
                bail!("duplicate reaction {:?}", rxn.id);
            }
            if !rxn.lower_bound.is_finite()
                || !rxn.upper_bound.is_finite()
                || rxn.lower_bound > rxn.upper_bound
            {
                bail!(
                    "reaction {:?} has invalid bounds [{}, {}]",
                    rxn.id,
                    rxn.lower_bound,
                    rxn.upper_bound
                );
            }
            for (met, &coef) in &rxn.metabolites {
                let &i = met_idx
                    .get(met)
                    .with_context(|| format!("reaction {:?} uses unknown metabolite {met:?}", rxn.id))?;
                rows[i].push((j, coef));
            }

            // Exchange: a single extracellular metabolite crossing the system boundary.
            if rxn.metabolites.len() == 1 {
                let met = rxn.metabolites.keys().next().map(String::as_str);
                if let Some(met) = met.filter(|met| extracellular.contains(*met)) {
                    if let Some(other) = exchanges.insert(met.to_string(), rxn.id.clone()) {
                        log::debug!("{met:?} has several exchanges, keeping {:?} over {other:?}", rxn.id);
                    }
                }
            }

            lower.push(rxn.lower_bound);
            upper.push(rxn.upper_bound);
            objective.push(rxn.objective_coefficient);
            reaction_ids.push(rxn.id);
        }

        let lp = LinearProgram {
            rhs: vec![0.0; rows.len()],
            rows,
            lower,
            upper,
            objective,
        };

        Ok(Self {
            id: doc.id.unwrap_or_default(),
            reaction_ids,
            reaction_idx,
            exchanges,
            lp,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn n_reactions(&self) -> usize {
        self.reaction_ids.len()
    }

    /// Make `reaction` the only objective term, with coefficient one.
    pub fn set_objective(&mut self, reaction: &str) -> Result<()> {
        let j = self.index(reaction)?;
        self.lp.objective.fill(0.0);
        self.lp.objective[j] = 1.0;
        Ok(())
    }

    /// Open the listed exchanges to `[-1000, 1000]`.
    ///
    /// Reactions missing from the model are skipped.
    pub fn open_exchanges(&mut self, reactions: &[String]) {
        for reaction in reactions {
            match self.reaction_idx.get(reaction) {
                Some(&j) => {
                    self.lp.lower[j] = -OPEN_BOUND;
                    self.lp.upper[j] = OPEN_BOUND;
                }
                None => log::debug!("essential exchange {reaction:?} not in model"),
            }
        }
    }

    fn index(&self, reaction: &str) -> Result<usize> {
        self.reaction_idx
            .get(reaction)
            .copied()
            .with_context(|| format!("unknown reaction {reaction:?}"))
    }
}

impl FluxModel for Network {
    fn exchanges(&self) -> &ExchangeMap {
        &self.exchanges
    }

    fn optimize(&mut self, bounds: &LowerBounds) -> Result<Solution> {
        let mut lp = self.lp.clone();
        for (reaction, &bound) in bounds {
            let j = self.index(reaction)?;
            lp.lower[j] = bound;
        }

        let (objective, values) = match lp.solve().context("failed to solve linear program")? {
            LpOutcome::Optimal { objective, values } => (objective, values),
            LpOutcome::Infeasible => return Ok(Solution::Infeasible),
        };

        let fluxes: Fluxes = self
            .exchanges
            .values()
            .map(|reaction| (reaction.clone(), values[self.reaction_idx[reaction]]))
            .collect();

        Ok(Solution::Optimal { objective, fluxes })
    }
}
