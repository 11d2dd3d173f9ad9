//! Bidirectional charging (Model 2): price plus exponential degradation cost,
//! minimized over signed power with discharging to the grid allowed.
//!
//! `|p|` is not differentiable at zero, so every slot's power is split into a
//! charge part `c >= 0` and a discharge part `d >= 0` with `p = c - d`, and
//! degradation is charged on `c + d`. Running both at once only adds
//! degradation, so an optimum never does.

use std::time::Instant;

use nalgebra::DMatrix;
use tracing::{info, warn};

use crate::general::config::ChargingConfig;
use crate::general::error::ChargeOptError;
use crate::general::schedule::{
    ChargeModel, ChargeSchedule, ConvergenceStatus, SolverDiagnostics,
};
use crate::model::constraints::{ConstraintModel, PowerBounds, SocConstraints};
use crate::model::cost::CostModel;
use crate::nonlinear::clarabel_minimizer::ClarabelMinimizer;
use crate::nonlinear::minimizer::{
    Bounds, ExpLinearObjective, ExpTerm, LinearConstraints, Minimizer,
};

/// `sum price * (c - d) + R * b * exp(k * (c + d))` over
/// `x = [c_0 .. c_{n-1}, d_0 .. d_{n-1}]`.
fn split_objective(cost: &CostModel<'_>) -> ExpLinearObjective {
    let prices = cost.prices();
    let n = prices.len();
    let weight = cost.replacement_cost() * cost.base_rate();
    let exponent = cost.exponent_per_kw();
    ExpLinearObjective {
        linear: prices
            .iter()
            .copied()
            .chain(prices.iter().map(|price| -price))
            .collect(),
        exp_terms: (0..n)
            .map(|slot| ExpTerm {
                weight,
                coefficients: vec![(slot, exponent), (n + slot, exponent)],
            })
            .collect(),
    }
}

fn split_bounds(bounds: &PowerBounds) -> Bounds {
    let charge_lower = bounds.lower.iter().map(|lo| lo.max(0.0));
    let charge_upper = bounds.upper.iter().map(|hi| hi.max(0.0));
    let discharge_lower = bounds.upper.iter().map(|hi| (-hi).max(0.0));
    let discharge_upper = bounds.lower.iter().map(|lo| (-lo).max(0.0));
    Bounds {
        lower: charge_lower.chain(discharge_lower).collect(),
        upper: charge_upper.chain(discharge_upper).collect(),
    }
}

/// The SOC rows act on `c - d`, i.e. `[P, -P]` for the prefix-sum operator `P`.
fn split_constraints(soc: &SocConstraints) -> LinearConstraints {
    let n = soc.operator.len();
    let prefix_sum = soc.operator.to_matrix();
    let mut matrix = DMatrix::zeros(n, 2 * n);
    matrix.columns_mut(0, n).copy_from(&prefix_sum);
    matrix.columns_mut(n, n).copy_from(&(-prefix_sum));
    LinearConstraints {
        matrix,
        lower: soc.lower.clone(),
        upper: soc.upper.clone(),
    }
}

fn split_profile(profile: &[f64]) -> Vec<f64> {
    let charge = profile.iter().map(|p| p.max(0.0));
    let discharge = profile.iter().map(|p| (-p).max(0.0));
    charge.chain(discharge).collect()
}

fn merge_profile(x: &[f64]) -> Vec<f64> {
    let (charge, discharge) = x.split_at(x.len() / 2);
    charge.iter().zip(discharge).map(|(c, d)| c - d).collect()
}

/// Optimizes the bidirectional model with the default Clarabel backend.
pub fn run_v2g_opt(config: &ChargingConfig) -> Result<ChargeSchedule, ChargeOptError> {
    run_v2g_opt_with(config, &ClarabelMinimizer::from_options(&config.solver))
}

/// Optimizes the bidirectional model with the given minimizer.
///
/// Only a converged run yields `Ok`. Infeasible and unconverged runs return
/// the last iterate inside the error when the solver left a finite one.
pub fn run_v2g_opt_with<M: Minimizer + ?Sized>(
    config: &ChargingConfig,
    minimizer: &M,
) -> Result<ChargeSchedule, ChargeOptError> {
    config.validate()?;
    let cost = CostModel::new(config);
    let constraints = ConstraintModel::from_config(config);
    info!(
        slots = config.horizon_hours,
        window_start = config.window.start,
        window_end = config.window.end,
        target_soc = config.battery.target_soc,
        "starting V2G optimization"
    );

    let start_time = Instant::now();
    let outcome = minimizer.minimize(
        &split_objective(&cost),
        &split_bounds(&constraints.bounds),
        &split_constraints(&constraints.soc),
        &split_profile(&config.initial_guess()),
    )?;
    let optimization_duration = start_time.elapsed();

    let power_kw = merge_profile(&outcome.x);
    let schedule = power_kw.iter().all(|power| power.is_finite()).then(|| {
        let diagnostics = SolverDiagnostics {
            status: outcome.status,
            iterations: outcome.iterations,
            optimality: outcome.optimality,
            duration_ms: optimization_duration.as_millis(),
        };
        ChargeSchedule::from_profile(
            ChargeModel::V2g,
            power_kw,
            config,
            &cost,
            &constraints,
            diagnostics,
        )
    });
    info!(
        status = ?outcome.status,
        iterations = outcome.iterations,
        total_cost = schedule.as_ref().map(|schedule| schedule.costs.total),
        duration_ms = optimization_duration.as_millis(),
        "V2G optimization finished"
    );

    match (outcome.status, schedule) {
        (ConvergenceStatus::Infeasible, schedule) => Err(ChargeOptError::Infeasible {
            violation: schedule.as_ref().map(|schedule| schedule.constraint_violation),
            schedule: schedule.map(Box::new),
        }),
        (ConvergenceStatus::Converged, Some(schedule)) => Ok(schedule),
        (ConvergenceStatus::IterationLimit | ConvergenceStatus::Stalled, Some(schedule)) => {
            Err(ChargeOptError::NotConverged {
                iterations: outcome.iterations,
                optimality: outcome.optimality,
                violation: schedule.constraint_violation,
                schedule: Box::new(schedule),
            })
        }
        (status, None) => Err(ChargeOptError::Numerical(format!(
            "solver returned a non-finite power profile ({status:?})"
        ))),
    }
}

/// Result of one target in [`run_target_soc_sweep`].
#[derive(Debug)]
pub struct SweepPoint {
    pub target_soc: f64,
    pub result: Result<ChargeSchedule, ChargeOptError>,
}

/// Re-solves the bidirectional model for each departure SOC in `targets`.
/// A failing target does not stop the sweep.
pub fn run_target_soc_sweep(config: &ChargingConfig, targets: &[f64]) -> Vec<SweepPoint> {
    targets
        .iter()
        .map(|&target_soc| {
            let result = run_v2g_opt(&config.with_target_soc(target_soc));
            match &result {
                Ok(schedule) => info!(
                    target_soc,
                    total_cost = schedule.costs.total,
                    "sweep point solved"
                ),
                Err(error) => warn!(target_soc, %error, "sweep point failed"),
            }
            SweepPoint { target_soc, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ev_model::vehicle::{ChargerLimits, DegradationShape, PlugInWindow};

    use super::*;
    use crate::general::error::ConfigError;
    use crate::linear::g2v_opt::run_g2v_opt;

    const SOC_TOLERANCE: f64 = 1e-6;

    fn assert_soc_within_capacity(schedule: &ChargeSchedule) {
        for (slot, energy) in schedule.soc_kwh.iter().enumerate() {
            assert!(
                *energy >= -SOC_TOLERANCE && *energy <= schedule.capacity_kwh + SOC_TOLERANCE,
                "SOC {energy} out of range in slot {slot}"
            );
        }
    }

    fn assert_zero_outside_window(schedule: &ChargeSchedule, window: PlugInWindow) {
        for (slot, power) in schedule.power_kw.iter().enumerate() {
            if !window.contains(slot) {
                assert_eq!(*power, 0.0, "slot {slot} outside the window");
            }
        }
    }

    #[test]
    fn test_reference_scenario() {
        let config = ChargingConfig::default();
        let schedule = run_v2g_opt(&config).unwrap();

        assert!(schedule.is_converged());
        assert_eq!(schedule.model, ChargeModel::V2g);
        assert_eq!(schedule.power_kw.len(), 24);
        assert!(schedule.costs.electricity > 1.0 && schedule.costs.electricity < 1.5);
        assert!(schedule.costs.degradation > 0.8 && schedule.costs.degradation < 1.2);
        assert!(schedule.costs.total > 2.0 && schedule.costs.total < 2.6);
        assert!((schedule.costs.total - 2.27).abs() < 0.05);
        assert_eq!(
            schedule.costs.total,
            schedule.costs.electricity + schedule.costs.degradation
        );

        // Stored energy at the deadline reaches the 0.9 target.
        assert!(schedule.soc_kwh[21] >= 24.0 - SOC_TOLERANCE);
        assert!(schedule.delivered_through(21) >= 18.0 - SOC_TOLERANCE);
        assert_soc_within_capacity(&schedule);
        assert_zero_outside_window(&schedule, config.window);
        assert!(schedule.constraint_violation < SOC_TOLERANCE);
    }

    #[test]
    fn test_reference_scenario_uses_the_grid() {
        let schedule = run_v2g_opt(&ChargingConfig::default()).unwrap();
        // Discharging during the morning peak is cheaper than idling.
        assert!(schedule.energy_discharged_kwh() > 1.0);
        assert!(schedule.power_kw[5..9].iter().all(|power| *power < 0.0));
        for power in &schedule.power_kw {
            assert!(power.abs() <= 6.6 + SOC_TOLERANCE);
        }
    }

    #[test]
    fn test_repeated_runs_agree() {
        let config = ChargingConfig::default();
        let first = run_v2g_opt(&config).unwrap();
        let second = run_v2g_opt(&config).unwrap();
        for (a, b) in first.power_kw.iter().zip(&second.power_kw) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(first.diagnostics.iterations, second.diagnostics.iterations);
    }

    #[test]
    fn test_unreachable_target_is_infeasible() {
        // Two slots of 6.6 kW cannot deliver the 18 kWh the target needs.
        let mut config = ChargingConfig::default();
        config.window = PlugInWindow::new(1, 3);
        let error = run_v2g_opt(&config).unwrap_err();
        assert!(
            matches!(error, ChargeOptError::Infeasible { .. }),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn test_full_charge_target_converges() {
        // The deadline row becomes an equality at the capacity.
        let config = ChargingConfig::default().with_target_soc(1.0);
        let schedule = run_v2g_opt(&config).unwrap();
        assert!(schedule.is_converged());
        assert!((schedule.soc_kwh[21] - 30.0).abs() < SOC_TOLERANCE);
        assert_soc_within_capacity(&schedule);
        assert_zero_outside_window(&schedule, config.window);
    }

    #[test]
    fn test_full_battery_staying_full_converges() {
        let mut config = ChargingConfig::default().with_target_soc(1.0);
        config.battery.initial_soc = 1.0;
        let schedule = run_v2g_opt(&config).unwrap();
        assert!(schedule.is_converged());
        assert!(schedule.soc_kwh[21] >= 30.0 - SOC_TOLERANCE);
        assert!(schedule.delivered_through(21).abs() < SOC_TOLERANCE);
        assert_soc_within_capacity(&schedule);
        assert_zero_outside_window(&schedule, config.window);
    }

    #[test]
    fn test_invalid_config_fails_before_solving() {
        let mut config = ChargingConfig::default();
        config.battery.capacity_kwh = -1.0;
        let error = run_v2g_opt(&config).unwrap_err();
        assert!(matches!(
            error,
            ChargeOptError::Config(ConfigError::NonPositiveCapacity(_))
        ));
    }

    #[test]
    fn test_zero_degradation_matches_linear_program() {
        let mut config = ChargingConfig::default();
        config.degradation = DegradationShape::none();
        config.charger = ChargerLimits::unidirectional(6.6);

        let v2g = run_v2g_opt(&config).unwrap();
        let g2v = run_g2v_opt(&config).unwrap();
        assert_eq!(v2g.costs.degradation, 0.0);
        assert!((v2g.costs.electricity - g2v.costs.electricity).abs() < 1e-4);
        // 18 kWh at the valley price.
        assert!((v2g.costs.electricity - 18.0 * 0.1377).abs() < 1e-4);
    }

    #[test]
    fn test_bidirectional_is_never_worse_than_charge_only() {
        let config = ChargingConfig::default();
        let bidirectional = run_v2g_opt(&config).unwrap();
        let charge_only = run_v2g_opt(&config.charge_only()).unwrap();
        assert!(bidirectional.costs.total <= charge_only.costs.total + 1e-6);
        assert!(charge_only.power_kw.iter().all(|power| *power >= -SOC_TOLERANCE));
    }

    #[test]
    fn test_full_day_window() {
        let mut config = ChargingConfig::default();
        config.window = PlugInWindow::new(0, 24);
        let schedule = run_v2g_opt(&config).unwrap();
        assert!(schedule.soc_kwh[23] >= 27.0 - SOC_TOLERANCE);
        assert_soc_within_capacity(&schedule);
    }

    #[test]
    fn test_explicit_initial_guess_reaches_same_optimum() {
        let config = ChargingConfig::default();
        let mut guessed = config.clone();
        guessed.solver.initial_guess =
            Some((0..24).map(|slot| (slot % 3) as f64 - 1.0).collect());

        let reference = run_v2g_opt(&config).unwrap();
        let schedule = run_v2g_opt(&guessed).unwrap();
        assert!((reference.costs.total - schedule.costs.total).abs() < 1e-6);
        assert_zero_outside_window(&schedule, config.window);
    }

    #[test]
    fn test_iteration_budget_exhaustion_is_not_converged() {
        let mut config = ChargingConfig::default();
        config.solver.max_iterations = 2;
        match run_v2g_opt(&config).unwrap_err() {
            ChargeOptError::NotConverged {
                iterations,
                schedule,
                ..
            } => {
                assert!(iterations <= 2);
                assert_eq!(schedule.diagnostics.status, ConvergenceStatus::IterationLimit);
                assert!(!schedule.is_converged());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_target_soc_sweep() {
        let config = ChargingConfig::default();
        let points = run_target_soc_sweep(&config, &[0.3, 0.6, 0.9, 1.5]);
        assert_eq!(points.len(), 4);

        let totals: Vec<f64> = points[..3]
            .iter()
            .map(|point| point.result.as_ref().unwrap().costs.total)
            .collect();
        // Higher departure targets cost more.
        assert!(totals[0] <= totals[1] + 1e-9);
        assert!(totals[1] <= totals[2] + 1e-9);
        assert!(matches!(
            points[3].result,
            Err(ChargeOptError::Config(ConfigError::SocOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_split_objective_matches_cost_model() {
        let config = ChargingConfig::default();
        let cost = CostModel::new(&config);
        let objective = split_objective(&cost);
        assert_eq!(objective.dimension(), 48);
        assert_eq!(objective.exp_terms.len(), 24);

        let profile: Vec<f64> = (0..24).map(|slot| (slot as f64 - 12.0) * 0.5).collect();
        let x = split_profile(&profile);
        assert_eq!(merge_profile(&x), profile);
        assert!((objective.value(&x) - cost.total_cost(&profile)).abs() < 1e-12);
    }

    #[test]
    fn test_split_constraints_act_on_net_power() {
        let config = ChargingConfig::default();
        let constraints = ConstraintModel::from_config(&config);
        let split = split_constraints(&constraints.soc);
        assert_eq!(split.rows(), 24);
        assert_eq!(split.row_entries(1), vec![(0, 1.0), (1, 1.0), (24, -1.0), (25, -1.0)]);
        assert_eq!(split.lower, constraints.soc.lower);
    }

    #[test]
    fn test_split_bounds() {
        let bounds = PowerBounds {
            lower: vec![0.0, -6.6, 2.0],
            upper: vec![0.0, 6.6, 5.0],
        };
        let split = split_bounds(&bounds);
        assert_eq!(split.lower, vec![0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        assert_eq!(split.upper, vec![0.0, 6.6, 5.0, 0.0, 6.6, 0.0]);
    }
}
