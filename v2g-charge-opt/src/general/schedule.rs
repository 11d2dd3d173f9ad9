use serde::Serialize;

use crate::general::config::ChargingConfig;
use crate::model::constraints::ConstraintModel;
use crate::model::cost::CostModel;

/// Which formulation produced a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChargeModel {
    /// Unidirectional linear program without degradation
    G2v,
    /// Bidirectional nonlinear program with exponential degradation
    V2g,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConvergenceStatus {
    Converged,
    /// Iteration budget exhausted before the tolerances were met
    IterationLimit,
    /// The solver certified that bounds and constraints cannot all hold
    Infeasible,
    /// Progress stopped short of the tolerances, e.g. on numerical trouble
    Stalled,
}

/// Monetary cost of a profile, split into its two components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CostBreakdown {
    pub electricity: f64,
    pub degradation: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverDiagnostics {
    pub status: ConvergenceStatus,
    pub iterations: usize,
    /// Final scaled optimality measure; zero when the backend does not report one
    pub optimality: f64,
    pub duration_ms: u128,
}

/// Result of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeSchedule {
    pub model: ChargeModel,
    /// Signed power per slot in kW; positive charges the vehicle
    pub power_kw: Vec<f64>,
    /// Energy stored at the end of each slot in kWh
    pub soc_kwh: Vec<f64>,
    pub capacity_kwh: f64,
    pub costs: CostBreakdown,
    /// Largest violation of the power bounds or SOC constraints, in kW / kWh
    pub constraint_violation: f64,
    pub diagnostics: SolverDiagnostics,
}

impl ChargeSchedule {
    pub fn from_profile(
        model: ChargeModel,
        power_kw: Vec<f64>,
        config: &ChargingConfig,
        cost: &CostModel<'_>,
        constraints: &ConstraintModel,
        diagnostics: SolverDiagnostics,
    ) -> Self {
        let initial_energy = config.battery.initial_energy_kwh();
        let soc_kwh = constraints
            .soc
            .operator
            .apply(&power_kw)
            .into_iter()
            .map(|delivered| initial_energy + delivered)
            .collect();
        Self {
            model,
            costs: cost.breakdown(&power_kw),
            constraint_violation: constraints.max_violation(&power_kw),
            power_kw,
            soc_kwh,
            capacity_kwh: config.battery.capacity_kwh,
            diagnostics,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.diagnostics.status == ConvergenceStatus::Converged
    }

    /// State of charge after each slot as a fraction of capacity.
    pub fn soc_fraction(&self) -> Vec<f64> {
        self.soc_kwh
            .iter()
            .map(|energy| energy / self.capacity_kwh)
            .collect()
    }

    /// Net energy delivered to the vehicle up to and including `slot`.
    pub fn delivered_through(&self, slot: usize) -> f64 {
        self.power_kw.iter().take(slot + 1).sum()
    }

    /// Total energy drawn from the grid.
    pub fn energy_charged_kwh(&self) -> f64 {
        self.power_kw.iter().filter(|power| **power > 0.0).sum()
    }

    /// Total energy fed back into the grid, as a positive number.
    pub fn energy_discharged_kwh(&self) -> f64 {
        -self.power_kw.iter().filter(|power| **power < 0.0).sum::<f64>()
    }
}
