//! Error metrics comparing a simulated run with its ground truth.

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, Result};

/// Simulated and actual duration of one phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingPair {
    pub simulated: f64,
    pub actual: f64,
}

impl TimingPair {
    pub fn new(simulated: f64, actual: f64) -> Self {
        Self { simulated, actual }
    }

    pub fn abs_diff(&self) -> f64 {
        (self.simulated - self.actual).abs()
    }
}

/// Quality of one trial. All values are fractions, reports scale them to percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// `(simulated_elapsed - actual_elapsed) / actual_elapsed`.
    pub simulation_error: f64,
    /// Sum of absolute per-phase differences, in seconds.
    pub sum_of_differences: f64,
    /// `sum_of_differences / actual_elapsed`.
    pub percent_difference: f64,
}

impl ErrorMetrics {
    /// Computes all metrics from raw timings.
    ///
    /// `workload` only names the run in the error returned when `elapsed.actual` is zero, which is how
    /// the simulator marks a workload without ground truth.
    pub fn compute(map: TimingPair, reduce: TimingPair, elapsed: TimingPair, workload: &str) -> Result<Self> {
        let sum_of_differences = map.abs_diff() + reduce.abs_diff() + elapsed.abs_diff();
        Self::from_sum(sum_of_differences, elapsed, workload)
    }

    /// Completes metrics when the simulator already reported the sum of differences.
    pub fn from_sum(sum_of_differences: f64, elapsed: TimingPair, workload: &str) -> Result<Self> {
        if elapsed.actual == 0.0 {
            return Err(CalibrationError::MissingGroundTruth {
                workload: workload.to_string(),
            });
        }
        Ok(Self {
            simulation_error: (elapsed.simulated - elapsed.actual) / elapsed.actual,
            sum_of_differences,
            percent_difference: sum_of_differences / elapsed.actual,
        })
    }

    /// Whether the trial passes a quality floor on the absolute simulation error.
    pub fn within(&self, max_simulation_error: f64) -> bool {
        self.simulation_error.abs() < max_simulation_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_metrics() {
        let metrics = ErrorMetrics::compute(
            TimingPair::new(440., 438.),
            TimingPair::new(670., 672.),
            TimingPair::new(1231.2, 1172.),
            "512-32-4",
        )
        .unwrap();
        assert!((metrics.sum_of_differences - 63.2).abs() < 1e-9);
        assert!((metrics.simulation_error - 59.2 / 1172.).abs() < 1e-12);
        assert!((metrics.percent_difference - 63.2 / 1172.).abs() < 1e-12);
    }

    #[test]
    fn negative_error_keeps_sign() {
        let metrics = ErrorMetrics::from_sum(10., TimingPair::new(90., 100.), "w").unwrap();
        assert!((metrics.simulation_error + 0.1).abs() < 1e-12);
        assert!(metrics.within(0.5));
        assert!(!metrics.within(0.1));
    }

    #[test]
    fn zero_actual_is_missing_ground_truth() {
        let err = ErrorMetrics::from_sum(5., TimingPair::new(100., 0.), "256-32-4").unwrap_err();
        assert!(matches!(err, CalibrationError::MissingGroundTruth { workload } if workload == "256-32-4"));
    }
}
