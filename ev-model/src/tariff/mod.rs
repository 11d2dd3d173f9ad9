pub mod electricity;
pub mod price_curve;

pub use electricity::{HourRange, RateTier, Tariff};
pub use price_curve::PriceCurve;
