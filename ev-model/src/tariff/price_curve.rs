use serde::{Deserialize, Serialize};

/// Price per kWh for each hourly slot of the horizon, slot 0 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceCurve(Vec<f64>);

impl PriceCurve {
    pub fn new(prices: Vec<f64>) -> Self {
        Self(prices)
    }

    /// Builds a curve from consecutive blocks of `(hours, price)`.
    pub fn from_blocks(blocks: &[(usize, f64)]) -> Self {
        let prices = blocks
            .iter()
            .flat_map(|&(hours, price)| std::iter::repeat(price).take(hours))
            .collect();
        Self(prices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, slot: usize) -> Option<f64> {
        self.0.get(slot).copied()
    }

    /// Returns the first slot holding an invalid price (negative, NaN or infinite).
    pub fn first_invalid_slot(&self) -> Option<usize> {
        self.0
            .iter()
            .position(|price| !price.is_finite() || *price < 0.0)
    }

    pub fn min_price(&self) -> Option<f64> {
        self.0.iter().copied().reduce(f64::min)
    }

    pub fn max_price(&self) -> Option<f64> {
        self.0.iter().copied().reduce(f64::max)
    }
}

impl From<Vec<f64>> for PriceCurve {
    fn from(prices: Vec<f64>) -> Self {
        Self::new(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_blocks() {
        let curve = PriceCurve::from_blocks(&[(2, 0.1), (1, 0.2), (3, 0.1)]);
        assert_eq!(curve.as_slice(), &[0.1, 0.1, 0.2, 0.1, 0.1, 0.1]);
        assert_eq!(curve.len(), 6);
        assert_eq!(curve.max_price(), Some(0.2));
        assert_eq!(curve.min_price(), Some(0.1));
    }

    #[test]
    fn test_invalid_slot_detection() {
        assert_eq!(PriceCurve::new(vec![0.1, 0.0, 0.3]).first_invalid_slot(), None);
        assert_eq!(PriceCurve::new(vec![0.1, -0.2]).first_invalid_slot(), Some(1));
        assert_eq!(PriceCurve::new(vec![f64::NAN]).first_invalid_slot(), Some(0));
    }
}
