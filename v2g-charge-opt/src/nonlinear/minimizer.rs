//! Interface between the charging model and a convex solver backend.

use nalgebra::{DMatrix, DVector};

use crate::general::error::ChargeOptError;
use crate::general::schedule::ConvergenceStatus;
use crate::model::cost::capped_exp;

/// `weight * exp(coefficients . x)` with the coefficients given sparsely as
/// `(variable, coefficient)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpTerm {
    pub weight: f64,
    pub coefficients: Vec<(usize, f64)>,
}

impl ExpTerm {
    pub fn exponent(&self, x: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .map(|&(variable, coefficient)| coefficient * x[variable])
            .sum()
    }

    pub fn value(&self, x: &[f64]) -> f64 {
        self.weight * capped_exp(self.exponent(x))
    }
}

/// `linear . x` plus a sum of exponential terms. Convex as long as every
/// weight is non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpLinearObjective {
    pub linear: Vec<f64>,
    pub exp_terms: Vec<ExpTerm>,
}

impl ExpLinearObjective {
    pub fn dimension(&self) -> usize {
        self.linear.len()
    }

    pub fn value(&self, x: &[f64]) -> f64 {
        let linear: f64 = self.linear.iter().zip(x).map(|(c, x)| c * x).sum();
        let exponential: f64 = self.exp_terms.iter().map(|term| term.value(x)).sum();
        linear + exponential
    }
}

/// Per-variable bounds; infinite entries mean unbounded. `lower == upper`
/// fixes a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// `lower <= matrix * x <= upper`, row by row. Infinite entries drop that
/// side and `lower == upper` makes the row an equality.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraints {
    pub matrix: DMatrix<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl LinearConstraints {
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Non-zero entries of `row` as `(column, coefficient)` pairs.
    pub fn row_entries(&self, row: usize) -> Vec<(usize, f64)> {
        self.matrix
            .row(row)
            .iter()
            .enumerate()
            .filter(|(_, coefficient)| **coefficient != 0.0)
            .map(|(column, coefficient)| (column, *coefficient))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeOutcome {
    pub x: Vec<f64>,
    pub objective: f64,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    /// Relative duality gap at the returned point
    pub optimality: f64,
    /// Largest absolute bound or constraint violation at the returned point
    pub constraint_violation: f64,
}

/// A solver backend for bound- and linearly-constrained minimization of an
/// [`ExpLinearObjective`].
///
/// Failing to converge is reported through [`MinimizeOutcome::status`];
/// `Err` is reserved for problems that cannot be set up at all. Backends
/// without warm starts only check the length of `initial_guess`.
pub trait Minimizer {
    fn minimize(
        &self,
        objective: &ExpLinearObjective,
        bounds: &Bounds,
        constraints: &LinearConstraints,
        initial_guess: &[f64],
    ) -> Result<MinimizeOutcome, ChargeOptError>;
}

/// Rejects problems whose parts disagree on the number of variables or whose
/// bounds are crossed or NaN.
pub(crate) fn check_problem(
    objective: &ExpLinearObjective,
    bounds: &Bounds,
    constraints: &LinearConstraints,
    initial_guess: &[f64],
) -> Result<(), ChargeOptError> {
    let n = objective.dimension();
    if bounds.lower.len() != n || bounds.upper.len() != n || initial_guess.len() != n {
        return Err(ChargeOptError::Problem(format!(
            "objective has {n} variables but bounds have {}/{} and the guess {}",
            bounds.lower.len(),
            bounds.upper.len(),
            initial_guess.len()
        )));
    }
    let rows = constraints.rows();
    let columns = constraints.matrix.ncols();
    if columns != n || constraints.lower.len() != rows || constraints.upper.len() != rows {
        return Err(ChargeOptError::Problem(format!(
            "constraint matrix is {rows}x{columns} with {} lower and {} upper entries, \
             expected {n} columns",
            constraints.lower.len(),
            constraints.upper.len()
        )));
    }
    for (term, exp_term) in objective.exp_terms.iter().enumerate() {
        if !(exp_term.weight >= 0.0 && exp_term.weight.is_finite()) {
            return Err(ChargeOptError::Problem(format!(
                "exponential term {term} has weight {}",
                exp_term.weight
            )));
        }
        if exp_term.coefficients.iter().any(|&(variable, _)| variable >= n) {
            return Err(ChargeOptError::Problem(format!(
                "exponential term {term} refers to a variable outside 0..{n}"
            )));
        }
    }
    let crossed = |lower: &[f64], upper: &[f64]| {
        lower.iter().zip(upper).position(|(lo, hi)| !(lo <= hi))
    };
    if let Some(variable) = crossed(&bounds.lower, &bounds.upper) {
        return Err(ChargeOptError::Problem(format!(
            "bounds of variable {variable} are crossed or NaN"
        )));
    }
    if let Some(row) = crossed(&constraints.lower, &constraints.upper) {
        return Err(ChargeOptError::Problem(format!(
            "bounds of constraint row {row} are crossed or NaN"
        )));
    }
    Ok(())
}

/// Largest amount by which `x` leaves its bounds or constraint rows.
pub(crate) fn max_violation(bounds: &Bounds, constraints: &LinearConstraints, x: &[f64]) -> f64 {
    let outside = |value: f64, lower: f64, upper: f64| {
        (lower - value).max(value - upper).max(0.0)
    };
    let bound_violation = x
        .iter()
        .zip(bounds.lower.iter().zip(&bounds.upper))
        .map(|(&value, (&lower, &upper))| outside(value, lower, upper))
        .fold(0.0, f64::max);
    let rows = &constraints.matrix * DVector::from_column_slice(x);
    let row_violation = rows
        .iter()
        .zip(constraints.lower.iter().zip(&constraints.upper))
        .map(|(&value, (&lower, &upper))| outside(value, lower, upper))
        .fold(0.0, f64::max);
    bound_violation.max(row_violation)
}
