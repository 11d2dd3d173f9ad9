pub mod tariff;
pub mod vehicle;

/// Number of hourly slots in the default optimization horizon.
pub const HOURS_PER_DAY: usize = 24;
