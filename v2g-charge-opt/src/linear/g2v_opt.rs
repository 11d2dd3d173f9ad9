//! Unidirectional charging (Model 1): a linear program over charge-only
//! power, minimizing the electricity bill alone.
//!
//! Degradation is left out of the objective but still priced into the
//! returned schedule, so both models report comparable costs.

use std::time::Instant;

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, Solver, SolverModel, Variable,
    constraint, variable,
};
use tracing::{debug, info};

use crate::general::config::ChargingConfig;
use crate::general::error::ChargeOptError;
use crate::general::schedule::{ChargeModel, ChargeSchedule, ConvergenceStatus, SolverDiagnostics};
use crate::model::constraints::ConstraintModel;
use crate::model::cost::CostModel;

/// Power of every slot: an LP variable inside the window, a constant outside.
enum SlotPower {
    Free(Variable),
    Fixed(f64),
}

fn create_variables(vars: &mut ProblemVariables, constraints: &ConstraintModel) -> Vec<SlotPower> {
    (0..constraints.horizon())
        .map(|slot| {
            let (lower, upper) = constraints.bounds.slot(slot);
            if constraints.bounds.is_fixed(slot) {
                SlotPower::Fixed(lower)
            } else {
                SlotPower::Free(vars.add(variable().min(lower).max(upper)))
            }
        })
        .collect()
}

fn generate_objective(powers: &[SlotPower], prices: &[f64]) -> Expression {
    let mut objective = Expression::default();
    for (power, price) in powers.iter().zip(prices) {
        if let SlotPower::Free(var) = power {
            objective += *var * *price;
        }
    }
    objective
}

/// Adds one pair of cumulative SOC rows per slot. Rows that involve no
/// variable are checked directly and returned as a violation instead.
fn add_soc_constraints<M>(
    mut model: M,
    powers: &[SlotPower],
    constraints: &ConstraintModel,
) -> Result<M, ChargeOptError>
where
    M: SolverModel,
{
    let mut cumulative = Expression::default();
    let mut offset = 0.0;
    let mut has_variable = false;
    for (row, power) in powers.iter().enumerate() {
        match power {
            SlotPower::Free(var) => {
                cumulative += *var;
                has_variable = true;
            }
            SlotPower::Fixed(value) => offset += value,
        }
        let (lower, upper) = (constraints.soc.lower[row], constraints.soc.upper[row]);
        if !has_variable {
            let violation = (lower - offset).max(offset - upper);
            if violation > 0.0 {
                debug!(row, violation, "SOC row without free slots is violated");
                return Err(ChargeOptError::Infeasible {
                    violation: Some(violation),
                    schedule: None,
                });
            }
            continue;
        }
        if lower == upper {
            model = model.with(constraint!(cumulative.clone() == upper - offset));
        } else {
            model = model.with(constraint!(cumulative.clone() <= upper - offset));
            model = model.with(constraint!(cumulative.clone() >= lower - offset));
        }
    }
    Ok(model)
}

/// Optimizes the charge-only model with the pure-Rust Clarabel backend.
pub fn run_g2v_opt(config: &ChargingConfig) -> Result<ChargeSchedule, ChargeOptError> {
    run_g2v_opt_with(config, good_lp::clarabel)
}

/// Optimizes the charge-only model with any `good_lp` solver. Discharging is
/// disabled regardless of the configured minimum power.
pub fn run_g2v_opt_with<S>(
    config: &ChargingConfig,
    solver: S,
) -> Result<ChargeSchedule, ChargeOptError>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    config.validate()?;
    let charge_only = config.charge_only();
    let cost = CostModel::new(&charge_only);
    let constraints = ConstraintModel::from_config(&charge_only);
    info!(
        slots = config.horizon_hours,
        window_start = config.window.start,
        window_end = config.window.end,
        target_soc = config.battery.target_soc,
        "starting G2V optimization"
    );

    let mut vars = ProblemVariables::new();
    let powers = create_variables(&mut vars, &constraints);
    let objective = generate_objective(&powers, cost.prices());

    let start_time = Instant::now();
    let model = add_soc_constraints(vars.minimise(objective).using(solver), &powers, &constraints)?;
    let solution = model.solve().map_err(|error| match error {
        ResolutionError::Infeasible => ChargeOptError::Infeasible {
            violation: None,
            schedule: None,
        },
        other => ChargeOptError::Lp(other),
    })?;
    let power_kw: Vec<f64> = powers
        .iter()
        .map(|power| match power {
            SlotPower::Free(var) => solution.value(*var),
            SlotPower::Fixed(value) => *value,
        })
        .collect();
    let optimization_duration = start_time.elapsed();

    let diagnostics = SolverDiagnostics {
        status: ConvergenceStatus::Converged,
        iterations: 0,
        optimality: 0.0,
        duration_ms: optimization_duration.as_millis(),
    };
    let schedule = ChargeSchedule::from_profile(
        ChargeModel::G2v,
        power_kw,
        &charge_only,
        &cost,
        &constraints,
        diagnostics,
    );
    info!(
        total_cost = schedule.costs.total,
        duration_ms = schedule.diagnostics.duration_ms,
        "G2V optimization finished"
    );
    Ok(schedule)
}
