use std::path::PathBuf;

use thiserror::Error;

use crate::general::schedule::ChargeSchedule;

/// Malformed input, rejected before any solver runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("horizon must contain at least one hourly slot")]
    EmptyHorizon,

    #[error("price curve has {actual} slots, expected {expected}")]
    PriceLengthMismatch { expected: usize, actual: usize },

    #[error("price {price} in slot {slot} is not a finite non-negative number")]
    InvalidPrice { slot: usize, price: f64 },

    #[error("battery capacity must be positive, got {0}")]
    NonPositiveCapacity(f64),

    #[error("{name} must lie in [0, 1], got {value}")]
    SocOutOfRange { name: &'static str, value: f64 },

    #[error("plug-in window [{start}, {end}) does not fit a {horizon}-slot horizon")]
    InvalidWindow {
        start: usize,
        end: usize,
        horizon: usize,
    },

    #[error("power limits [{min}, {max}] are invalid")]
    InvalidPowerLimits { min: f64, max: f64 },

    #[error("replacement cost must be finite and non-negative, got {0}")]
    InvalidReplacementCost(f64),

    #[error("degradation {name} is invalid: {value}")]
    InvalidDegradation { name: &'static str, value: f64 },

    #[error("initial guess has {actual} slots, expected {expected}")]
    InitialGuessLengthMismatch { expected: usize, actual: usize },

    #[error("initial guess contains a non-finite value in slot {0}")]
    NonFiniteInitialGuess(usize),

    #[error("solver {name} must be positive, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },

    #[error("solver iteration budget must be at least 1")]
    ZeroIterationBudget,

    #[error("tariff does not cover every hour of the day exactly once")]
    InvalidTariff,
}

#[derive(Debug, Error)]
pub enum ChargeOptError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Bounds and constraints cannot all hold. Carries the last iterate and
    /// its violation when the solver produced a usable one.
    #[error("charging problem is infeasible{}", describe_violation(.violation))]
    Infeasible {
        violation: Option<f64>,
        schedule: Option<Box<ChargeSchedule>>,
    },

    /// Iteration budget exhausted or the iteration stalled before meeting the
    /// tolerances. The approximate schedule is not trustworthy as an optimum.
    #[error(
        "solver stopped after {iterations} iterations without converging \
         (optimality {optimality:.3e}, constraint violation {violation:.3e})"
    )]
    NotConverged {
        iterations: usize,
        optimality: f64,
        violation: f64,
        schedule: Box<ChargeSchedule>,
    },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("malformed optimization problem: {0}")]
    Problem(String),

    #[error("LP solver failed: {0}")]
    Lp(#[from] good_lp::ResolutionError),

    #[error("could not read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

fn describe_violation(violation: &Option<f64>) -> String {
    match violation {
        Some(violation) => format!(" (constraint violation {violation:.3e})"),
        None => String::new(),
    }
}

impl ChargeOptError {
    /// The approximate schedule attached to a failed solve, if any.
    pub fn schedule(&self) -> Option<&ChargeSchedule> {
        match self {
            ChargeOptError::Infeasible { schedule, .. } => schedule.as_deref(),
            ChargeOptError::NotConverged { schedule, .. } => Some(schedule),
            _ => None,
        }
    }
}
