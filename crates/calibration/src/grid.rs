//! Candidate calibration factors.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Pair of calibration factors passed to one simulator invocation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorPair {
    pub map_factor: f64,
    pub reduce_factor: f64,
}

impl FactorPair {
    pub fn new(map_factor: f64, reduce_factor: f64) -> Self {
        Self {
            map_factor,
            reduce_factor,
        }
    }

    /// Key used to match log records with issued trials.
    ///
    /// The simulator prints factors with two decimals, so two pairs that agree to two decimals share a key.
    pub fn key(&self) -> String {
        format!("{:.2} {:.2}", self.map_factor, self.reduce_factor)
    }
}

impl fmt::Display for FactorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}, {:.2}", self.map_factor, self.reduce_factor)
    }
}

/// Inclusive stepped range of factor values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl FactorRange {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Values `start, start + step, ...` while `<= end`, built by accumulating `step`.
    ///
    /// Empty when `start > end` or when `step` is not a positive finite number.
    pub fn iter(&self) -> FactorRangeIter {
        let valid = self.step.is_finite() && self.step > 0.0;
        FactorRangeIter {
            next: self.start,
            end: if valid { self.end } else { f64::NEG_INFINITY },
            step: self.step,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

impl IntoIterator for &FactorRange {
    type Item = f64;
    type IntoIter = FactorRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct FactorRangeIter {
    next: f64,
    end: f64,
    step: f64,
}

impl Iterator for FactorRangeIter {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next <= self.end {
            let value = self.next;
            self.next += self.step;
            Some(value)
        } else {
            None
        }
    }
}

/// All pairs of `maps x reduces`, map factor varying slowest.
pub fn cartesian_product(maps: &[f64], reduces: &[f64]) -> Vec<FactorPair> {
    maps.iter()
        .copied()
        .cartesian_product(reduces.iter().copied())
        .map(|(map_factor, reduce_factor)| FactorPair::new(map_factor, reduce_factor))
        .collect()
}

/// Grid of factor pairs covering both ranges.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FactorGrid {
    pub map: FactorRange,
    pub reduce: FactorRange,
}

impl FactorGrid {
    pub fn pairs(&self) -> Vec<FactorPair> {
        cartesian_product(&self.map.values(), &self.reduce.values())
    }
}

impl Default for FactorGrid {
    fn default() -> Self {
        Self {
            map: FactorRange::new(0.8, 1.2, 0.01),
            reduce: FactorRange::new(0.8, 1.2, 0.01),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_ranges_are_empty() {
        assert!(FactorRange::new(1.0, 0.5, 0.1).values().is_empty());
        assert!(FactorRange::new(0.0, 1.0, 0.0).values().is_empty());
        assert!(FactorRange::new(0.0, 1.0, -0.1).values().is_empty());
        assert!(FactorRange::new(0.0, 1.0, f64::NAN).values().is_empty());
    }

    #[test]
    fn single_point_range() {
        assert_eq!(FactorRange::new(0.5, 0.5, 0.1).values(), vec![0.5]);
    }

    #[test]
    fn range_is_restartable() {
        let range = FactorRange::new(0.8, 1.2, 0.01);
        assert_eq!(range.values(), range.iter().collect::<Vec<_>>());
    }

    #[test]
    fn product_is_row_major() {
        let pairs = cartesian_product(&[0.8, 0.9], &[1.0, 1.1]);
        assert_eq!(
            pairs,
            vec![
                FactorPair::new(0.8, 1.0),
                FactorPair::new(0.8, 1.1),
                FactorPair::new(0.9, 1.0),
                FactorPair::new(0.9, 1.1),
            ]
        );
    }

    #[test]
    fn key_uses_two_decimals() {
        assert_eq!(FactorPair::new(0.8300000000000001, 1.0).key(), "0.83 1.00");
    }
}
