use serde::{Deserialize, Serialize};

/// The vehicle battery, modelled as an ideal energy store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    /// Usable capacity in kWh
    pub capacity_kwh: f64,
    /// State of charge when the vehicle plugs in (fraction, 0-1)
    pub initial_soc: f64,
    /// State of charge required when the vehicle leaves (fraction, 0-1)
    pub target_soc: f64,
    /// Cost of replacing the whole pack, in the price-curve currency
    pub replacement_cost: f64,
}

impl Battery {
    /// Energy stored at plug-in, in kWh.
    pub fn initial_energy_kwh(&self) -> f64 {
        self.initial_soc * self.capacity_kwh
    }

    /// Net energy that must be delivered by the end of the window.
    pub fn required_charge_kwh(&self) -> f64 {
        (self.target_soc - self.initial_soc) * self.capacity_kwh
    }

    /// Net energy that can be added before the battery is full.
    pub fn headroom_kwh(&self) -> f64 {
        (1.0 - self.initial_soc) * self.capacity_kwh
    }

    /// Net energy that can be withdrawn before the battery is empty.
    pub fn reserve_kwh(&self) -> f64 {
        self.initial_energy_kwh()
    }
}
