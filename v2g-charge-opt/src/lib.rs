pub mod general;
pub mod linear;
pub mod model;
pub mod nonlinear;

// Re-export commonly used items for convenience
pub use general::comparison::compare_models;
pub use general::config::ChargingConfig;
pub use general::error::ChargeOptError;
pub use general::schedule::ChargeSchedule;
pub use linear::g2v_opt::run_g2v_opt;
pub use nonlinear::v2g_opt::{run_target_soc_sweep, run_v2g_opt};
