//! Feasible region of the charging problem: per-slot power bounds plus
//! cumulative state-of-charge limits.

use ev_model::vehicle::ChargerLimits;
use nalgebra::DMatrix;

use crate::general::config::ChargingConfig;

/// Running-sum operator: `apply(x)[k] = x[0] + ... + x[k]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixSum {
    len: usize,
}

impl PrefixSum {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .take(self.len)
            .scan(0.0, |sum, value| {
                *sum += value;
                Some(*sum)
            })
            .collect()
    }

    /// Coefficient of `x[column]` in output `row`.
    pub fn coefficient(&self, row: usize, column: usize) -> f64 {
        if column <= row { 1.0 } else { 0.0 }
    }

    /// Dense lower-triangular matrix of ones.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len, self.len, |row, column| {
            self.coefficient(row, column)
        })
    }
}

/// Lower and upper power limit of every slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl PowerBounds {
    pub fn slot(&self, slot: usize) -> (f64, f64) {
        (self.lower[slot], self.upper[slot])
    }

    pub fn is_fixed(&self, slot: usize) -> bool {
        self.lower[slot] == self.upper[slot]
    }
}

/// `lower[k] <= (prefix sum of the profile)[k] <= upper[k]` for every row.
#[derive(Debug, Clone, PartialEq)]
pub struct SocConstraints {
    pub operator: PrefixSum,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintModel {
    pub bounds: PowerBounds,
    pub soc: SocConstraints,
}

impl ConstraintModel {
    pub fn from_config(config: &ChargingConfig) -> Self {
        Self::new(config, config.charger)
    }

    /// Builds the region for explicit charger limits, so the unidirectional
    /// model can reuse the same SOC rows with discharging removed.
    ///
    /// Expects a validated config.
    pub fn new(config: &ChargingConfig, limits: ChargerLimits) -> Self {
        let horizon = config.horizon_hours;
        let window = config.window;

        let (lower, upper) = (0..horizon)
            .map(|slot| {
                if window.contains(slot) {
                    (limits.min_power_kw, limits.max_power_kw)
                } else {
                    (0.0, 0.0)
                }
            })
            .unzip();

        // Relative to the energy at plug-in, so that the absolute SOC stays in
        // [0, capacity]. Past the deadline the sum is frozen by the zero bounds.
        let battery = &config.battery;
        let mut soc_lower = vec![-battery.reserve_kwh(); horizon];
        let soc_upper = vec![battery.headroom_kwh(); horizon];
        // The target applies at the last plugged-in slot.
        if let Some(deadline) = window.last_slot() {
            soc_lower[deadline] = battery.required_charge_kwh();
        }

        Self {
            bounds: PowerBounds { lower, upper },
            soc: SocConstraints {
                operator: PrefixSum::new(horizon),
                lower: soc_lower,
                upper: soc_upper,
            },
        }
    }

    pub fn horizon(&self) -> usize {
        self.bounds.lower.len()
    }

    /// Largest amount by which `profile` breaks a bound or SOC row; 0 when feasible.
    pub fn max_violation(&self, profile: &[f64]) -> f64 {
        let bound_violation = profile
            .iter()
            .zip(self.bounds.lower.iter().zip(&self.bounds.upper))
            .map(|(&power, (&lower, &upper))| excess(power, lower, upper));
        let cumulative = self.soc.operator.apply(profile);
        let soc_violation = cumulative
            .iter()
            .zip(self.soc.lower.iter().zip(&self.soc.upper))
            .map(|(&delivered, (&lower, &upper))| excess(delivered, lower, upper));
        bound_violation.chain(soc_violation).fold(0.0, f64::max)
    }
}

fn excess(value: f64, lower: f64, upper: f64) -> f64 {
    (lower - value).max(value - upper).max(0.0)
}

#[cfg(test)]
mod tests {
    use ev_model::vehicle::PlugInWindow;

    use super::*;

    #[test]
    fn test_prefix_sum_matches_matrix() {
        let operator = PrefixSum::new(4);
        let x = [1.0, -2.0, 0.5, 3.0];
        assert_eq!(operator.apply(&x), vec![1.0, -1.0, -0.5, 2.5]);

        let matrix = operator.to_matrix();
        let product = &matrix * nalgebra::DVector::from_column_slice(&x);
        assert_eq!(product.as_slice(), operator.apply(&x).as_slice());
        assert_eq!(matrix[(0, 0)], 1.0);
        assert_eq!(matrix[(0, 1)], 0.0);
        assert_eq!(matrix[(3, 0)], 1.0);
    }

    #[test]
    fn test_bounds_are_zero_outside_window() {
        let config = ChargingConfig::default();
        let model = ConstraintModel::from_config(&config);
        assert_eq!(model.bounds.slot(0), (0.0, 0.0));
        assert_eq!(model.bounds.slot(1), (-6.6, 6.6));
        assert_eq!(model.bounds.slot(21), (-6.6, 6.6));
        assert_eq!(model.bounds.slot(22), (0.0, 0.0));
        assert!(model.bounds.is_fixed(23));
    }

    #[test]
    fn test_soc_rows() {
        let config = ChargingConfig::default();
        let model = ConstraintModel::from_config(&config);
        for row in 0..24 {
            assert!((model.soc.upper[row] - 21.0).abs() < 1e-12);
            let expected_lower = if row == 21 { 18.0 } else { -9.0 };
            assert!((model.soc.lower[row] - expected_lower).abs() < 1e-12);
        }
    }

    #[test]
    fn test_full_day_window_uses_last_row_as_deadline() {
        let mut config = ChargingConfig::default();
        config.window = PlugInWindow::new(0, 24);
        let model = ConstraintModel::from_config(&config);
        assert!((model.soc.lower[23] - 18.0).abs() < 1e-12);
        assert!((model.soc.lower[22] + 9.0).abs() < 1e-12);
        assert_eq!(model.bounds.slot(0), (-6.6, 6.6));
    }

    #[test]
    fn test_charge_only_limits() {
        let config = ChargingConfig::default();
        let model = ConstraintModel::new(&config, config.charger.charge_only());
        assert_eq!(model.bounds.slot(5), (0.0, 6.6));
    }

    #[test]
    fn test_violation_measure() {
        let config = ChargingConfig::default();
        let model = ConstraintModel::from_config(&config);
        let mut profile = vec![0.0; 24];
        // Only the deadline row is violated, by the full 18 kWh.
        assert!((model.max_violation(&profile) - 18.0).abs() < 1e-12);

        for slot in 1..4 {
            profile[slot] = 6.0;
        }
        // 18 kWh by slot 3 satisfies every row.
        assert_eq!(model.max_violation(&profile), 0.0);

        profile[0] = 1.0;
        assert!((model.max_violation(&profile) - 1.0).abs() < 1e-12);
    }
}
