use serde::Serialize;
use tracing::info;

use crate::general::config::ChargingConfig;
use crate::general::error::ChargeOptError;
use crate::general::schedule::ChargeSchedule;
use crate::linear::g2v_opt::run_g2v_opt;
use crate::nonlinear::v2g_opt::run_v2g_opt;

/// Both models solved on the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub g2v: ChargeSchedule,
    pub v2g: ChargeSchedule,
}

impl ModelComparison {
    /// Total cost avoided by allowing discharge, degradation included.
    pub fn saving(&self) -> f64 {
        self.g2v.costs.total - self.v2g.costs.total
    }

    /// Saving relative to the charge-only total, in percent.
    pub fn saving_percent(&self) -> f64 {
        if self.g2v.costs.total == 0.0 {
            return 0.0;
        }
        self.saving() / self.g2v.costs.total * 100.0
    }
}

pub fn compare_models(config: &ChargingConfig) -> Result<ModelComparison, ChargeOptError> {
    let g2v = run_g2v_opt(config)?;
    let v2g = run_v2g_opt(config)?;
    let comparison = ModelComparison { g2v, v2g };
    info!(
        g2v_total = comparison.g2v.costs.total,
        v2g_total = comparison.v2g.costs.total,
        saving = comparison.saving(),
        "compared charging models"
    );
    Ok(comparison)
}
