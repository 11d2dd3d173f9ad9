use std::path::Path;

use ev_model::HOURS_PER_DAY;
use ev_model::tariff::{PriceCurve, Tariff};
use ev_model::vehicle::{Battery, ChargerLimits, DegradationShape, PlugInWindow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::general::error::{ChargeOptError, ConfigError};

/// Everything one optimization run needs. Immutable once built; every run
/// takes it by reference, so several configurations can be solved side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingConfig {
    /// Number of hourly slots, slot 0 being the reference hour
    pub horizon_hours: usize,
    /// Price per kWh for each slot
    pub prices: PriceCurve,
    pub battery: Battery,
    pub charger: ChargerLimits,
    /// Slots `[start, end)` while the vehicle is plugged in
    pub window: PlugInWindow,
    pub degradation: DegradationShape,
    pub solver: SolverOptions,
}

/// Settings of the conic solver behind the bidirectional model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Absolute and relative duality gap at which the solve stops
    pub optimality_tolerance: f64,
    /// Relative primal and dual residual at which the solve stops
    pub constraint_tolerance: f64,
    pub max_iterations: usize,
    /// Uniform starting power for every slot, used when `initial_guess` is unset.
    /// Backends that choose their own interior start only check its shape.
    pub initial_power_kw: f64,
    /// Explicit per-slot starting profile
    pub initial_guess: Option<Vec<f64>>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            optimality_tolerance: 1e-8,
            constraint_tolerance: 1e-8,
            max_iterations: 200,
            initial_power_kw: 1.0,
            initial_guess: None,
        }
    }
}

/// Two-tier day tariff of the reference run: valley 0.1377, peak 0.1781.
pub fn reference_prices() -> PriceCurve {
    PriceCurve::from_blocks(&[(5, 0.1377), (4, 0.1781), (10, 0.1377), (5, 0.1781)])
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            horizon_hours: HOURS_PER_DAY,
            prices: reference_prices(),
            battery: Battery {
                capacity_kwh: 30.0,
                initial_soc: 0.30,
                target_soc: 0.90,
                replacement_cost: 4000.0,
            },
            charger: ChargerLimits::bidirectional(6.6),
            window: PlugInWindow::new(1, 22),
            degradation: DegradationShape {
                base_rate: 1e-5,
                decay_rate: 0.05,
                power_scale: None,
            },
            solver: SolverOptions::default(),
        }
    }
}

impl ChargingConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ChargeOptError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ChargeOptError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ChargeOptError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Copy of this configuration with a different departure SOC.
    pub fn with_target_soc(&self, target_soc: f64) -> Self {
        let mut config = self.clone();
        config.battery.target_soc = target_soc;
        config
    }

    /// Copy with discharging to the grid disabled.
    pub fn charge_only(&self) -> Self {
        let mut config = self.clone();
        config.charger = config.charger.charge_only();
        config
    }

    /// Copy whose price curve is expanded from `tariff`, slot 0 falling on
    /// clock hour `start_hour`.
    pub fn with_tariff(&self, tariff: &Tariff, start_hour: u8) -> Result<Self, ConfigError> {
        if !tariff.is_valid() {
            return Err(ConfigError::InvalidTariff);
        }
        let mut config = self.clone();
        config.prices = tariff.to_price_curve(start_hour, self.horizon_hours);
        Ok(config)
    }

    /// Power that normalizes the degradation exponent.
    pub fn power_scale(&self) -> f64 {
        self.degradation
            .resolved_power_scale(self.charger.max_power_kw)
    }

    /// Starting profile for the minimizer.
    pub fn initial_guess(&self) -> Vec<f64> {
        match &self.solver.initial_guess {
            Some(guess) => guess.clone(),
            None => vec![self.solver.initial_power_kw; self.horizon_hours],
        }
    }

    /// Rejects malformed input. Never clamps or repairs a value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check().inspect_err(|error| warn!(%error, "rejected charging configuration"))
    }

    fn check(&self) -> Result<(), ConfigError> {
        let horizon = self.horizon_hours;
        if horizon == 0 {
            return Err(ConfigError::EmptyHorizon);
        }
        if self.prices.len() != horizon {
            return Err(ConfigError::PriceLengthMismatch {
                expected: horizon,
                actual: self.prices.len(),
            });
        }
        if let Some(slot) = self.prices.first_invalid_slot() {
            return Err(ConfigError::InvalidPrice {
                slot,
                price: self.prices.as_slice()[slot],
            });
        }

        let battery = &self.battery;
        if !(battery.capacity_kwh.is_finite() && battery.capacity_kwh > 0.0) {
            return Err(ConfigError::NonPositiveCapacity(battery.capacity_kwh));
        }
        for (name, value) in [
            ("initial SOC", battery.initial_soc),
            ("target SOC", battery.target_soc),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::SocOutOfRange { name, value });
            }
        }
        if !(battery.replacement_cost.is_finite() && battery.replacement_cost >= 0.0) {
            return Err(ConfigError::InvalidReplacementCost(battery.replacement_cost));
        }

        let window = self.window;
        if window.start >= window.end || window.end > horizon {
            return Err(ConfigError::InvalidWindow {
                start: window.start,
                end: window.end,
                horizon,
            });
        }

        let limits = self.charger;
        let limits_finite = limits.min_power_kw.is_finite() && limits.max_power_kw.is_finite();
        if !limits_finite || limits.max_power_kw <= 0.0 || limits.min_power_kw > limits.max_power_kw
        {
            return Err(ConfigError::InvalidPowerLimits {
                min: limits.min_power_kw,
                max: limits.max_power_kw,
            });
        }

        let shape = self.degradation;
        if !(shape.base_rate.is_finite() && shape.base_rate >= 0.0) {
            return Err(ConfigError::InvalidDegradation {
                name: "base rate",
                value: shape.base_rate,
            });
        }
        if !(shape.decay_rate.is_finite() && shape.decay_rate >= 0.0) {
            return Err(ConfigError::InvalidDegradation {
                name: "decay rate",
                value: shape.decay_rate,
            });
        }
        let power_scale = self.power_scale();
        if !(power_scale.is_finite() && power_scale > 0.0) {
            return Err(ConfigError::InvalidDegradation {
                name: "power scale",
                value: power_scale,
            });
        }

        self.check_solver_options()
    }

    fn check_solver_options(&self) -> Result<(), ConfigError> {
        let options = &self.solver;
        for (name, value) in [
            ("optimality tolerance", options.optimality_tolerance),
            ("constraint tolerance", options.constraint_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidTolerance { name, value });
            }
        }
        if options.max_iterations == 0 {
            return Err(ConfigError::ZeroIterationBudget);
        }
        let guess = self.initial_guess();
        if guess.len() != self.horizon_hours {
            return Err(ConfigError::InitialGuessLengthMismatch {
                expected: self.horizon_hours,
                actual: guess.len(),
            });
        }
        if let Some(slot) = guess.iter().position(|value| !value.is_finite()) {
            return Err(ConfigError::NonFiniteInitialGuess(slot));
        }
        Ok(())
    }
}
