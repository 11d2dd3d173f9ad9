//! [`Minimizer`] backed by the Clarabel conic interior-point solver.
//!
//! Every exponential term `w * exp(a . x)` gets an epigraph variable `t`
//! with `(a . x, 1, t)` in the exponential cone and contributes `w * t` to a
//! now linear objective. Clarabel solves `min q'x` subject to `A x + s = b`
//! with `s` in a product of cones, laid out here as one zero cone for all
//! equalities, one non-negative cone for all inequalities and then one
//! exponential cone per term.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use tracing::debug;

use crate::general::config::SolverOptions;
use crate::general::error::ChargeOptError;
use crate::general::schedule::ConvergenceStatus;
use crate::nonlinear::minimizer::{
    Bounds, ExpLinearObjective, LinearConstraints, MinimizeOutcome, Minimizer, check_problem,
    max_violation,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ClarabelMinimizer {
    /// Absolute and relative duality gap tolerance
    pub optimality_tolerance: f64,
    /// Relative primal and dual feasibility tolerance
    pub constraint_tolerance: f64,
    pub max_iterations: usize,
}

impl ClarabelMinimizer {
    pub fn from_options(options: &SolverOptions) -> Self {
        Self {
            optimality_tolerance: options.optimality_tolerance,
            constraint_tolerance: options.constraint_tolerance,
            max_iterations: options.max_iterations,
        }
    }
}

impl Default for ClarabelMinimizer {
    fn default() -> Self {
        Self::from_options(&SolverOptions::default())
    }
}

/// Rows of `A x + s = b`, stored column by column as Clarabel expects.
struct ConicRows {
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
}

impl ConicRows {
    fn new(variables: usize) -> Self {
        Self {
            columns: vec![Vec::new(); variables],
            rhs: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.rhs.len()
    }

    /// Appends the row `entries . x + s = rhs`. Each variable may appear once.
    fn push(&mut self, entries: impl IntoIterator<Item = (usize, f64)>, rhs: f64) {
        let row = self.rhs.len();
        for (column, value) in entries {
            if value != 0.0 {
                self.columns[column].push((row, value));
            }
        }
        self.rhs.push(rhs);
    }

    /// `lower <= entries . x <= upper`, as an equality when the sides meet.
    fn push_two_sided(
        &mut self,
        entries: &[(usize, f64)],
        lower: f64,
        upper: f64,
        equality: bool,
    ) -> usize {
        let before = self.len();
        if equality {
            if lower == upper {
                self.push(entries.iter().copied(), upper);
            }
            return self.len() - before;
        }
        if lower == upper {
            return 0;
        }
        if upper.is_finite() {
            self.push(entries.iter().copied(), upper);
        }
        if lower.is_finite() {
            self.push(entries.iter().map(|&(column, value)| (column, -value)), -lower);
        }
        self.len() - before
    }

    fn into_matrix(self) -> (CscMatrix<f64>, Vec<f64>) {
        let rows = self.rhs.len();
        let mut col_ptr = Vec::with_capacity(self.columns.len() + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        col_ptr.push(0);
        for column in &self.columns {
            for &(row, value) in column {
                row_idx.push(row);
                values.push(value);
            }
            col_ptr.push(row_idx.len());
        }
        (
            CscMatrix::new(rows, self.columns.len(), col_ptr, row_idx, values),
            self.rhs,
        )
    }
}

fn convergence_status(status: &SolverStatus) -> ConvergenceStatus {
    match status {
        SolverStatus::Solved => ConvergenceStatus::Converged,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            ConvergenceStatus::Infeasible
        }
        SolverStatus::MaxIterations | SolverStatus::MaxTime => ConvergenceStatus::IterationLimit,
        _ => ConvergenceStatus::Stalled,
    }
}

impl Minimizer for ClarabelMinimizer {
    fn minimize(
        &self,
        objective: &ExpLinearObjective,
        bounds: &Bounds,
        constraints: &LinearConstraints,
        initial_guess: &[f64],
    ) -> Result<MinimizeOutcome, ChargeOptError> {
        check_problem(objective, bounds, constraints, initial_guess)?;
        let n = objective.dimension();
        let exp_terms: Vec<_> = objective
            .exp_terms
            .iter()
            .filter(|term| term.weight > 0.0)
            .collect();
        let variables = n + exp_terms.len();
        let row_entries: Vec<_> = (0..constraints.rows())
            .map(|row| constraints.row_entries(row))
            .collect();

        let mut rows = ConicRows::new(variables);
        let mut cones = Vec::new();
        for equality in [true, false] {
            let mut count = 0;
            for variable in 0..n {
                count += rows.push_two_sided(
                    &[(variable, 1.0)],
                    bounds.lower[variable],
                    bounds.upper[variable],
                    equality,
                );
            }
            for (row, entries) in row_entries.iter().enumerate() {
                count += rows.push_two_sided(
                    entries,
                    constraints.lower[row],
                    constraints.upper[row],
                    equality,
                );
            }
            if count > 0 {
                cones.push(if equality {
                    SupportedConeT::ZeroConeT(count)
                } else {
                    SupportedConeT::NonnegativeConeT(count)
                });
            }
        }
        for (index, term) in exp_terms.iter().enumerate() {
            rows.push(
                term.coefficients
                    .iter()
                    .map(|&(variable, coefficient)| (variable, -coefficient)),
                0.0,
            );
            rows.push(std::iter::empty(), 1.0);
            rows.push([(n + index, -1.0)], 0.0);
            cones.push(SupportedConeT::ExponentialConeT());
        }

        let q: Vec<f64> = objective
            .linear
            .iter()
            .copied()
            .chain(exp_terms.iter().map(|term| term.weight))
            .collect();
        let p = CscMatrix::new(variables, variables, vec![0; variables + 1], vec![], vec![]);
        let (a, b) = rows.into_matrix();

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .max_iter(u32::try_from(self.max_iterations).unwrap_or(u32::MAX))
            .tol_gap_abs(self.optimality_tolerance)
            .tol_gap_rel(self.optimality_tolerance)
            .tol_feas(self.constraint_tolerance)
            .build()
            .map_err(|e| ChargeOptError::Problem(format!("invalid solver settings: {e:?}")))?;
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
            .map_err(|e| ChargeOptError::Problem(format!("solver setup failed: {e:?}")))?;
        solver.solve();

        let solution = &solver.solution;
        let status = convergence_status(&solution.status);
        let mut x = solution.x[..n].to_vec();
        // Fixed variables come back exactly at their value.
        for (variable, value) in x.iter_mut().enumerate() {
            if bounds.lower[variable] == bounds.upper[variable] {
                *value = bounds.lower[variable];
            }
        }
        let optimality = (solution.obj_val - solution.obj_val_dual).abs()
            / (1.0 + solution.obj_val.abs());
        let iterations = solution.iterations as usize;
        debug!(
            clarabel_status = ?solution.status,
            iterations,
            optimality,
            rows = b.len(),
            variables,
            "clarabel finished"
        );

        Ok(MinimizeOutcome {
            objective: objective.value(&x),
            constraint_violation: max_violation(bounds, constraints, &x),
            x,
            status,
            iterations,
            optimality,
        })
    }
}
