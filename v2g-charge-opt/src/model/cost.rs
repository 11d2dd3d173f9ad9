//! Electricity and battery-degradation cost of a power profile.
//!
//! All functions accept any finite profile, including ones that violate the
//! power bounds, such as an unconverged solver iterate.

use crate::general::config::ChargingConfig;
use crate::general::schedule::CostBreakdown;

/// Exponent above which the exponential continues as its tangent line.
const EXPONENT_CAP: f64 = 50.0;

/// `exp(z)` up to [`EXPONENT_CAP`], then linear with matching slope.
/// Convex, increasing and finite for every finite `z`.
pub(crate) fn capped_exp(z: f64) -> f64 {
    if z <= EXPONENT_CAP {
        z.exp()
    } else {
        EXPONENT_CAP.exp() * (1.0 + (z - EXPONENT_CAP))
    }
}

#[derive(Debug, Clone)]
pub struct CostModel<'a> {
    prices: &'a [f64],
    replacement_cost: f64,
    base_rate: f64,
    /// `decay_rate / power_scale`, the exponent per kW
    exponent_per_kw: f64,
}

impl<'a> CostModel<'a> {
    pub fn new(config: &'a ChargingConfig) -> Self {
        Self {
            prices: config.prices.as_slice(),
            replacement_cost: config.battery.replacement_cost,
            base_rate: config.degradation.base_rate,
            exponent_per_kw: config.degradation.decay_rate / config.power_scale(),
        }
    }

    pub fn prices(&self) -> &[f64] {
        self.prices
    }

    pub fn replacement_cost(&self) -> f64 {
        self.replacement_cost
    }

    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    pub fn exponent_per_kw(&self) -> f64 {
        self.exponent_per_kw
    }

    /// Fraction of battery life consumed by one slot at `power_kw`.
    pub fn degradation_fraction(&self, power_kw: f64) -> f64 {
        self.base_rate * capped_exp(self.exponent_per_kw * power_kw.abs())
    }

    /// Sum of power times price over all slots. Negative when discharging
    /// at high prices earns more than charging costs.
    pub fn electricity_cost(&self, profile: &[f64]) -> f64 {
        debug_assert_eq!(profile.len(), self.prices.len());
        profile
            .iter()
            .zip(self.prices)
            .map(|(power, price)| power * price)
            .sum()
    }

    pub fn degradation_cost(&self, profile: &[f64]) -> f64 {
        profile
            .iter()
            .map(|&power| self.replacement_cost * self.degradation_fraction(power))
            .sum()
    }

    /// The minimization objective.
    pub fn total_cost(&self, profile: &[f64]) -> f64 {
        self.electricity_cost(profile) + self.degradation_cost(profile)
    }

    pub fn breakdown(&self, profile: &[f64]) -> CostBreakdown {
        let electricity = self.electricity_cost(profile);
        let degradation = self.degradation_cost(profile);
        CostBreakdown {
            electricity,
            degradation,
            total: electricity + degradation,
        }
    }
}
