use serde::{Deserialize, Serialize};

use crate::tariff::PriceCurve;

/// Time-of-use tariff for grid electricity, defined on clock hours of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tariff {
    /// Same price for every hour
    Fixed {
        /// Price per kWh
        rate: f64,
    },
    /// Named tiers, each applying to a set of clock-hour ranges
    Tiered {
        /// List of rate tiers
        tiers: Vec<RateTier>,
    },
}

/// A single tier of a time-of-use tariff (e.g. "Peak", "Valley")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub name: String,
    /// Price per kWh while this tier applies
    pub rate: f64,
    pub hour_ranges: Vec<HourRange>,
}

/// Clock hours `[from, till)`; `from > till` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    /// Starting hour (0-23)
    pub from: u8,
    /// Ending hour (1-24, exclusive)
    pub till: u8,
}

impl Tariff {
    pub fn fixed(rate: f64) -> Self {
        Self::Fixed { rate }
    }

    pub fn tiered(tiers: Vec<RateTier>) -> Self {
        Self::Tiered { tiers }
    }

    /// Expands the tariff into one price per slot.
    ///
    /// Slot `i` covers clock hour `(start_hour + i) % 24`, so a horizon that
    /// starts in the evening picks up the tariff of the following morning.
    pub fn to_price_curve(&self, start_hour: u8, horizon_hours: usize) -> PriceCurve {
        (0..horizon_hours)
            .map(|slot| {
                let hour = ((start_hour as usize + slot) % 24) as u8;
                self.rate_for_hour(hour)
            })
            .collect::<Vec<f64>>()
            .into()
    }

    /// Rate for a clock hour. Hours no tier covers are priced at 0.0;
    /// use [`Tariff::is_valid`] to rule that out.
    pub fn rate_for_hour(&self, hour: u8) -> f64 {
        match self {
            Tariff::Fixed { rate } => *rate,
            Tariff::Tiered { tiers } => tiers
                .iter()
                .find(|tier| tier.matches_hour(hour))
                .map_or(0.0, |tier| tier.rate),
        }
    }

    /// True when every clock hour is covered by exactly one tier.
    pub fn is_valid(&self) -> bool {
        match self {
            Tariff::Fixed { rate } => rate.is_finite() && *rate >= 0.0,
            Tariff::Tiered { tiers } => {
                let mut covered_hours = [false; 24];
                for tier in tiers {
                    if !tier.rate.is_finite() || tier.rate < 0.0 {
                        return false;
                    }
                    for range in &tier.hour_ranges {
                        if !mark_hours_covered(&mut covered_hours, range) {
                            return false;
                        }
                    }
                }
                covered_hours.iter().all(|&covered| covered)
            }
        }
    }
}

/// Marks the hours of `range` and returns false on overlap or an out-of-day hour.
fn mark_hours_covered(covered_hours: &mut [bool; 24], range: &HourRange) -> bool {
    if range.from > 23 || range.till > 24 {
        return false;
    }
    for hour in range.hours() {
        let slot = &mut covered_hours[hour as usize];
        if *slot {
            return false;
        }
        *slot = true;
    }
    true
}

impl RateTier {
    pub fn new(name: impl Into<String>, rate: f64, hour_ranges: Vec<HourRange>) -> Self {
        Self {
            name: name.into(),
            rate,
            hour_ranges,
        }
    }

    pub fn matches_hour(&self, hour: u8) -> bool {
        self.hour_ranges.iter().any(|range| range.contains(hour))
    }
}

impl HourRange {
    pub fn new(from: u8, till: u8) -> Self {
        Self { from, till }
    }

    pub fn contains(&self, hour: u8) -> bool {
        if self.from > self.till {
            hour >= self.from || hour < self.till
        } else {
            hour >= self.from && hour < self.till
        }
    }

    /// Clock hours covered by the range, in order.
    pub fn hours(&self) -> impl Iterator<Item = u8> {
        let (from, till) = (self.from, self.till);
        let (head, tail) = if from > till {
            (from..24, 0..till)
        } else {
            (from..till, 0..0)
        };
        head.chain(tail)
    }
}
