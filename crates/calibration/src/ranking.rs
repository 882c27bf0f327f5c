//! Ordering trial results by quality.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::record::TrialResult;

/// Metric results are sorted by, lower is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankKey {
    PercentDifference,
    /// Absolute value of the simulation error.
    SimulationError,
    SumOfDifferences,
}

impl RankKey {
    /// `None` for results without ground truth.
    pub fn value(&self, result: &TrialResult) -> Option<f64> {
        let metrics = result.metrics?;
        Some(match self {
            RankKey::PercentDifference => metrics.percent_difference,
            RankKey::SimulationError => metrics.simulation_error.abs(),
            RankKey::SumOfDifferences => metrics.sum_of_differences,
        })
    }

    fn compare(&self, a: &TrialResult, b: &TrialResult) -> Ordering {
        match (self.value(a), self.value(b)) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Sorts `results` ascending by `keys`, the first key being the most significant.
///
/// The sort is stable, so fully tied results keep their input (grid) order. Results without ground truth
/// go last.
pub fn rank(mut results: Vec<TrialResult>, keys: &[RankKey]) -> Vec<TrialResult> {
    results.sort_by(|a, b| {
        keys.iter()
            .fold(Ordering::Equal, |ordering, key| ordering.then_with(|| key.compare(a, b)))
    });
    results
}

/// Drops results whose absolute simulation error reaches `max_simulation_error`.
///
/// Results without ground truth are kept so they stay visible in reports.
pub fn apply_quality_floor(results: Vec<TrialResult>, max_simulation_error: Option<f64>) -> Vec<TrialResult> {
    let Some(max) = max_simulation_error else {
        return results;
    };
    results
        .into_iter()
        .filter(|result| result.metrics.map_or(true, |metrics| metrics.within(max)))
        .collect()
}
