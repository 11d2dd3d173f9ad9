pub mod comparison;
pub mod config;
pub mod error;
pub mod report;
pub mod schedule;

pub use comparison::{ModelComparison, compare_models};
pub use config::{ChargingConfig, SolverOptions};
pub use error::{ChargeOptError, ConfigError};
pub use schedule::{ChargeModel, ChargeSchedule, ConvergenceStatus, CostBreakdown};
