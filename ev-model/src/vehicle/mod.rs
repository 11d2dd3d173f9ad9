pub mod battery;
pub mod charger;
pub mod degradation;

pub use battery::Battery;
pub use charger::{ChargerLimits, PlugInWindow};
pub use degradation::DegradationShape;
