use serde::{Deserialize, Serialize};

/// Shape of the exponential battery-degradation curve.
///
/// The fraction of battery life consumed in one slot at power `p` is
/// `base_rate * exp(decay_rate * |p| / power_scale)`. When `power_scale`
/// is not set, the charger's maximum power is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradationShape {
    pub base_rate: f64,
    pub decay_rate: f64,
    #[serde(default)]
    pub power_scale: Option<f64>,
}

impl DegradationShape {
    /// No degradation at all; the nonlinear model collapses to a linear one.
    pub fn none() -> Self {
        Self {
            base_rate: 0.0,
            decay_rate: 0.0,
            power_scale: None,
        }
    }

    pub fn resolved_power_scale(&self, max_power_kw: f64) -> f64 {
        self.power_scale.unwrap_or(max_power_kw)
    }
}
