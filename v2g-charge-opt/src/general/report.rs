//! Console rendering of schedules.

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use ev_model::tariff::PriceCurve;
use tracing::{info, warn};

use crate::general::comparison::ModelComparison;
use crate::general::schedule::ChargeSchedule;
use crate::nonlinear::v2g_opt::SweepPoint;

/// Power below this magnitude is shown as idle.
const IDLE_POWER_KW: f64 = 1e-3;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table
}

fn amount_cell(value: f64) -> Cell {
    Cell::new(format!("{value:.4}")).set_alignment(CellAlignment::Right)
}

/// One row per slot: price, signed power and the SOC reached at its end.
/// Peak prices are red and valley prices green.
#[must_use]
pub fn build_schedule_table(schedule: &ChargeSchedule, prices: &PriceCurve) -> Table {
    let (min_price, max_price) = (prices.min_price(), prices.max_price());

    let mut table = new_table();
    table.set_header(vec!["Slot", "Price", "Power", "Energy", "SOC"]);
    let soc_fraction = schedule.soc_fraction();
    for (slot, (((power, energy), fraction), price)) in schedule
        .power_kw
        .iter()
        .zip(&schedule.soc_kwh)
        .zip(&soc_fraction)
        .zip(prices.as_slice())
        .enumerate()
    {
        let power_color = if *power > IDLE_POWER_KW {
            Color::Green
        } else if *power < -IDLE_POWER_KW {
            Color::Red
        } else {
            Color::Reset
        };
        let price_color = if Some(*price) == max_price && min_price != max_price {
            Color::Red
        } else if Some(*price) == min_price {
            Color::Green
        } else {
            Color::Reset
        };
        table.add_row(vec![
            Cell::new(slot).add_attribute(Attribute::Dim),
            amount_cell(*price).fg(price_color),
            Cell::new(format!("{power:+.3} kW"))
                .set_alignment(CellAlignment::Right)
                .fg(power_color),
            Cell::new(format!("{energy:.2} kWh")).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}%", fraction * 100.0)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[must_use]
pub fn build_comparison_table(comparison: &ModelComparison) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Model", "Electricity", "Degradation", "Total", "Discharged"]);
    for schedule in [&comparison.g2v, &comparison.v2g] {
        table.add_row(vec![
            Cell::new(format!("{:?}", schedule.model)),
            amount_cell(schedule.costs.electricity),
            amount_cell(schedule.costs.degradation),
            amount_cell(schedule.costs.total).add_attribute(Attribute::Bold),
            Cell::new(format!("{:.2} kWh", schedule.energy_discharged_kwh()))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[must_use]
pub fn build_sweep_table(points: &[SweepPoint]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Target SOC", "Electricity", "Degradation", "Total", "Status"]);
    for point in points {
        let target = Cell::new(format!("{:.0}%", point.target_soc * 100.0));
        let row = match &point.result {
            Ok(schedule) => vec![
                target,
                amount_cell(schedule.costs.electricity),
                amount_cell(schedule.costs.degradation),
                amount_cell(schedule.costs.total),
                Cell::new("ok").fg(Color::Green),
            ],
            Err(error) => vec![
                target,
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(error.to_string()).fg(Color::Red),
            ],
        };
        table.add_row(row);
    }
    table
}

/// Logs the cost breakdown and solver diagnostics of a schedule.
pub fn log_summary(schedule: &ChargeSchedule) {
    info!(
        model = ?schedule.model,
        electricity = schedule.costs.electricity,
        degradation = schedule.costs.degradation,
        total = schedule.costs.total,
        charged_kwh = schedule.energy_charged_kwh(),
        discharged_kwh = schedule.energy_discharged_kwh(),
        "cost breakdown"
    );
    if !schedule.is_converged() {
        warn!(
            status = ?schedule.diagnostics.status,
            iterations = schedule.diagnostics.iterations,
            violation = schedule.constraint_violation,
            "schedule is an unconverged approximation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::config::ChargingConfig;
    use crate::general::schedule::{
        ChargeModel, ConvergenceStatus, CostBreakdown, SolverDiagnostics,
    };

    fn schedule(power_kw: Vec<f64>) -> ChargeSchedule {
        let soc_kwh = power_kw
            .iter()
            .scan(9.0, |energy, power| {
                *energy += power;
                Some(*energy)
            })
            .collect();
        ChargeSchedule {
            model: ChargeModel::V2g,
            power_kw,
            soc_kwh,
            capacity_kwh: 30.0,
            costs: CostBreakdown {
                electricity: 1.0,
                degradation: 0.5,
                total: 1.5,
            },
            constraint_violation: 0.0,
            diagnostics: SolverDiagnostics {
                status: ConvergenceStatus::Converged,
                iterations: 12,
                optimality: 1e-9,
                duration_ms: 3,
            },
        }
    }

    #[test]
    fn test_schedule_table_has_one_row_per_slot() {
        let prices = PriceCurve::new(vec![0.1, 0.2, 0.1]);
        let table = build_schedule_table(&schedule(vec![6.6, -3.0, 0.0]), &prices);
        assert_eq!(table.row_iter().count(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("+6.600 kW"));
        assert!(rendered.contains("-3.000 kW"));
        assert!(rendered.contains("52.0%"));
    }

    #[test]
    fn test_sweep_table_shows_failures() {
        let points = vec![
            SweepPoint {
                target_soc: 0.5,
                result: Ok(schedule(vec![1.0])),
            },
            SweepPoint {
                target_soc: 1.5,
                result: Err(ChargingConfig::default()
                    .with_target_soc(1.5)
                    .validate()
                    .unwrap_err()
                    .into()),
            },
        ];
        let rendered = build_sweep_table(&points).to_string();
        assert!(rendered.contains("50%"));
        assert!(rendered.contains("target SOC"));
    }
}
