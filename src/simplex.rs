//! Dense two-phase primal simplex.
//!
//! Solves `max c·v` subject to `A v = b` and `lower <= v <= upper` with finite bounds.
//! Variables are shifted to `0 <= x <= upper - lower` and every upper bound becomes a
//! slack row, so the tableau is in standard form with a trivial starting basis for the
//! bound rows and one artificial variable per equality row.
//!
//! The tableau is dense with `m + n` rows and `2n + m` columns for `m` metabolites and
//! `n` reactions, rebuilt on every solve. That suits core metabolic models; a
//! genome-scale model with thousands of reactions needs hundreds of megabytes per solve.

use anyhow::{Result, bail};

/// Pivot and reduced-cost tolerance.
const EPS: f64 = 1e-9;

/// Largest phase 1 residual still accepted as feasible.
const FEAS_TOL: f64 = 1e-7;

/// Consecutive degenerate pivots before switching to Bland's rule.
const MAX_DEGENERATE: usize = 50;

/// Linear program `max c·v` subject to `A v = b` and `lower <= v <= upper`.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    /// Sparse rows of `A` as `(column, coefficient)` pairs.
    pub rows: Vec<Vec<(usize, f64)>>,
    /// Right-hand side `b`.
    pub rhs: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Objective coefficients `c`.
    pub objective: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    Optimal { objective: f64, values: Vec<f64> },
    Infeasible,
}

impl LinearProgram {
    /// Solve the program.
    ///
    /// # Errors
    /// Returns an error if the program is malformed, unbounded,
    /// or if the simplex fails to converge.
    pub fn solve(&self) -> Result<LpOutcome> {
        let n_var = self.objective.len();
        if self.lower.len() != n_var || self.upper.len() != n_var {
            bail!("bounds must have {n_var} entries");
        }
        if self.rhs.len() != self.rows.len() {
            bail!("right-hand side must have {} entries", self.rows.len());
        }
        for j in 0..n_var {
            let (lower, upper) = (self.lower[j], self.upper[j]);
            if !lower.is_finite() || !upper.is_finite() {
                bail!("variable {j} has non-finite bounds [{lower}, {upper}]");
            }
            if upper < lower - EPS {
                return Ok(LpOutcome::Infeasible);
            }
        }

        let n_eq = self.rows.len();
        let first_art = 2 * n_var;
        let mut tab = Tableau::new(n_eq + n_var, first_art + n_eq);

        // Equality rows, shifted by the lower bounds and sign-normalized.
        for (i, row) in self.rows.iter().enumerate() {
            let mut b = self.rhs[i];
            for &(j, a) in row {
                if j >= n_var {
                    bail!("row {i} refers to unknown column {j}");
                }
                b -= a * self.lower[j];
            }
            let sign = if b < 0.0 { -1.0 } else { 1.0 };
            for &(j, a) in row {
                *tab.at_mut(i, j) += sign * a;
            }
            *tab.at_mut(i, first_art + i) = 1.0;
            *tab.rhs_mut(i) = sign * b;
            tab.basis[i] = first_art + i;
        }

        // Bound rows: x_j + s_j = upper_j - lower_j.
        for j in 0..n_var {
            let i = n_eq + j;
            *tab.at_mut(i, j) = 1.0;
            *tab.at_mut(i, n_var + j) = 1.0;
            *tab.rhs_mut(i) = (self.upper[j] - self.lower[j]).max(0.0);
            tab.basis[i] = n_var + j;
        }

        let mut cost = vec![0.0; tab.n_col];
        cost[first_art..].fill(-1.0);
        tab.price(&cost);
        tab.optimize(tab.n_col)?;
        if tab.objective_value() < -FEAS_TOL {
            return Ok(LpOutcome::Infeasible);
        }
        tab.drive_out(first_art);

        let mut cost = vec![0.0; tab.n_col];
        cost[..n_var].copy_from_slice(&self.objective);
        tab.price(&cost);
        tab.optimize(first_art)?;

        let mut values = self.lower.clone();
        for (i, &col) in tab.basis.iter().enumerate() {
            if col < n_var {
                values[col] += tab.rhs(i);
            }
        }
        let objective: f64 = self
            .objective
            .iter()
            .zip(&values)
            .map(|(c, v)| c * v)
            .sum();

        Ok(LpOutcome::Optimal { objective, values })
    }
}

struct Tableau {
    n_row: usize,
    n_col: usize,
    stride: usize,
    data: Vec<f64>,
    basis: Vec<usize>,
    /// Reduced costs, with the current objective value in the last entry.
    cost_row: Vec<f64>,
}

impl Tableau {
    fn new(n_row: usize, n_col: usize) -> Self {
        let stride = n_col + 1;
        Self {
            n_row,
            n_col,
            stride,
            data: vec![0.0; n_row * stride],
            basis: vec![0; n_row],
            cost_row: vec![0.0; stride],
        }
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.stride + j]
    }

    fn at_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        &mut self.data[i * self.stride + j]
    }

    fn rhs(&self, i: usize) -> f64 {
        self.data[i * self.stride + self.n_col]
    }

    fn rhs_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.data[i * self.stride + self.n_col]
    }

    fn objective_value(&self) -> f64 {
        self.cost_row[self.n_col]
    }

    /// Rebuild the reduced costs of `cost` for the current basis.
    fn price(&mut self, cost: &[f64]) {
        self.cost_row = cost.iter().map(|c| -c).collect();
        self.cost_row.push(0.0);
        for i in 0..self.n_row {
            let c_basic = cost[self.basis[i]];
            if c_basic == 0.0 {
                continue;
            }
            let row = &self.data[i * self.stride..(i + 1) * self.stride];
            for (r, &a) in self.cost_row.iter_mut().zip(row) {
                *r += c_basic * a;
            }
        }
    }

    /// Pivot until no column below `n_enter` improves the objective.
    fn optimize(&mut self, n_enter: usize) -> Result<()> {
        let max_iter = 50 * (self.n_row + self.n_col);
        let mut n_degenerate = 0;
        for _ in 0..max_iter {
            let Some(col) = self.entering(n_enter, n_degenerate > MAX_DEGENERATE) else {
                return Ok(());
            };
            let Some(row) = self.leaving(col) else {
                bail!("linear program is unbounded");
            };
            if self.rhs(row) < EPS {
                n_degenerate += 1;
            } else {
                n_degenerate = 0;
            }
            self.pivot(row, col);
        }
        bail!("simplex did not converge within {max_iter} iterations")
    }

    fn entering(&self, n_enter: usize, bland: bool) -> Option<usize> {
        let mut candidates = (0..n_enter).filter(|&j| self.cost_row[j] < -EPS);
        if bland {
            candidates.next()
        } else {
            candidates.min_by(|&a, &b| self.cost_row[a].total_cmp(&self.cost_row[b]))
        }
    }

    fn leaving(&self, col: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.n_row {
            let a = self.at(i, col);
            if a <= EPS {
                continue;
            }
            let ratio = self.rhs(i) / a;
            best = match best {
                Some((r, r_ratio))
                    if ratio > r_ratio + EPS
                        || (ratio >= r_ratio - EPS && self.basis[i] > self.basis[r]) =>
                {
                    Some((r, r_ratio))
                }
                _ => Some((i, ratio)),
            };
        }
        best.map(|(i, _)| i)
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let stride = self.stride;
        let p = self.at(row, col);
        let pivot_row: Vec<f64> = self.data[row * stride..(row + 1) * stride]
            .iter()
            .map(|a| a / p)
            .collect();
        self.data[row * stride..(row + 1) * stride].copy_from_slice(&pivot_row);

        for i in 0..self.n_row {
            if i == row {
                continue;
            }
            let f = self.at(i, col);
            if f == 0.0 {
                continue;
            }
            let target = &mut self.data[i * stride..(i + 1) * stride];
            for (t, &a) in target.iter_mut().zip(&pivot_row) {
                *t -= f * a;
            }
            // Round-off must not leave the basis primal infeasible.
            if target[self.n_col] < 0.0 && target[self.n_col] > -EPS {
                target[self.n_col] = 0.0;
            }
        }

        let f = self.cost_row[col];
        if f != 0.0 {
            for (r, &a) in self.cost_row.iter_mut().zip(&pivot_row) {
                *r -= f * a;
            }
        }

        self.basis[row] = col;
    }

    /// Replace basic artificials (all at zero after phase 1) with structural columns.
    ///
    /// Rows with no structural entry are redundant; their artificial stays basic at zero.
    fn drive_out(&mut self, first_art: usize) {
        for i in 0..self.n_row {
            if self.basis[i] < first_art {
                continue;
            }
            if let Some(col) = (0..first_art).find(|&j| self.at(i, j).abs() > EPS) {
                self.pivot(i, col);
            }
        }
    }
}
