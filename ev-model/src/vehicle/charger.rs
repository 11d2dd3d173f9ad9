use serde::{Deserialize, Serialize};

/// Power limits of the charge point, in kW per hourly slot.
///
/// A negative `min_power_kw` enables discharging to the grid (V2G);
/// zero restricts the vehicle to charging only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargerLimits {
    pub min_power_kw: f64,
    pub max_power_kw: f64,
}

impl ChargerLimits {
    pub fn bidirectional(max_power_kw: f64) -> Self {
        Self {
            min_power_kw: -max_power_kw,
            max_power_kw,
        }
    }

    pub fn unidirectional(max_power_kw: f64) -> Self {
        Self {
            min_power_kw: 0.0,
            max_power_kw,
        }
    }

    pub fn allows_discharge(&self) -> bool {
        self.min_power_kw < 0.0
    }

    /// Same limits with discharging removed.
    pub fn charge_only(&self) -> Self {
        Self {
            min_power_kw: self.min_power_kw.max(0.0),
            max_power_kw: self.max_power_kw,
        }
    }
}

/// Slots `[start, end)` during which the vehicle is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlugInWindow {
    pub start: usize,
    pub end: usize,
}

impl PlugInWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, slot: usize) -> bool {
        slot >= self.start && slot < self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the last plugged-in slot, the deadline for the target SOC.
    pub fn last_slot(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.end - 1)
    }
}
