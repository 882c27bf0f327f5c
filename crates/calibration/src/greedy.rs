//! Greedy coordinate search for the two calibration factors.
//!
//! Each factor is swept once over its range while the other is held fixed. The sweep stops at the first
//! candidate that is worse than the best seen so far, so it assumes the error first decreases and then
//! increases with the factor. The pair it settles on is not necessarily the joint optimum.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    grid::{FactorPair, FactorRange},
    ground_truth::GroundTruth,
    simulator::Simulator,
};

/// Token starting the console line with simulated phase times.
pub const MEASUREMENT_MARKER: &str = "Simulated";

/// What to do when a trial prints no [MEASUREMENT_MARKER] line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingMarkerPolicy {
    /// Abort the search with [CalibrationError::MissingMarker].
    #[default]
    Fail,
    /// Reuse the measurement of the previous trial. The stale value can look like an improvement.
    ReuseLast,
}

/// Simulated times printed by one trial: average map task, average reduce task and, when printed, the
/// whole job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub map: f64,
    pub reduce: f64,
    pub elapsed: Option<f64>,
}

/// Reads the first [MEASUREMENT_MARKER] line of the console output.
///
/// `Ok(None)` if there is no such line.
pub fn parse_measurement(output: &str) -> Result<Option<Measurement>> {
    let Some(line) = output.lines().find(|line| line.contains(MEASUREMENT_MARKER)) else {
        return Ok(None);
    };
    let fields = line.split_whitespace().collect::<Vec<_>>();
    let field = |index: usize, name: &str| -> Result<Option<f64>> {
        fields
            .get(index)
            .map(|text| {
                text.parse()
                    .map_err(|_| CalibrationError::malformed(line, format!("{name} `{text}` is not a number")))
            })
            .transpose()
    };
    let required = |index: usize, name: &str| -> Result<f64> {
        field(index, name)?.ok_or_else(|| CalibrationError::malformed(line, format!("no {name} column")))
    };
    Ok(Some(Measurement {
        map: required(1, "simulated map time")?,
        reduce: required(2, "simulated reduce time")?,
        elapsed: field(3, "simulation time")?,
    }))
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    /// Candidates tried for each factor.
    pub range: FactorRange,
    /// Reduce factor used while the map factor is searched.
    pub initial_reduce_factor: f64,
    pub missing_marker: MissingMarkerPolicy,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            range: FactorRange::new(0.0, 2.0, 0.01),
            initial_reduce_factor: 1.0,
            missing_marker: MissingMarkerPolicy::Fail,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Map,
    Reduce,
}

impl Phase {
    fn pick(&self, measurement: &Measurement) -> f64 {
        match self {
            Phase::Map => measurement.map,
            Phase::Reduce => measurement.reduce,
        }
    }
}

/// Best value found for one factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CoordinateResult {
    pub value: f64,
    /// `|simulated - actual|` at `value`, in seconds.
    pub diff: f64,
    /// Trials run for this factor, including the one that ended the sweep.
    pub trials: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct GreedyOutcome {
    pub map: CoordinateResult,
    pub reduce: CoordinateResult,
    /// Console output of a final trial with both chosen factors.
    pub summary: String,
}

impl GreedyOutcome {
    pub fn factors(&self) -> FactorPair {
        FactorPair::new(self.map.value, self.reduce.value)
    }
}

pub struct GreedySearch<'a> {
    simulator: &'a dyn Simulator,
    config: GreedyConfig,
}

impl<'a> GreedySearch<'a> {
    pub fn new(simulator: &'a dyn Simulator, config: GreedyConfig) -> Self {
        Self { simulator, config }
    }

    /// Finds the map factor, then the reduce factor given that map factor.
    pub fn run(&self, truth: GroundTruth) -> Result<GreedyOutcome> {
        info!("Searching for the best map calibration factor...");
        let reduce_factor = self.config.initial_reduce_factor;
        let mut last = None;
        let map = self.sweep(Phase::Map, truth.map, &mut last, |value| FactorPair::new(value, reduce_factor))?;
        info!("Map calibration factor: {:.2} ({} trials)", map.value, map.trials);

        info!("Searching for the best reduce calibration factor...");
        let reduce = self.sweep(Phase::Reduce, truth.reduce, &mut last, |value| FactorPair::new(map.value, value))?;
        info!("Reduce calibration factor: {:.2} ({} trials)", reduce.value, reduce.trials);

        let summary = self.simulator.run(FactorPair::new(map.value, reduce.value))?;
        Ok(GreedyOutcome { map, reduce, summary })
    }

    /// `last` carries the most recent measurement across sweeps for [MissingMarkerPolicy::ReuseLast].
    fn sweep(
        &self,
        phase: Phase,
        actual: f64,
        last: &mut Option<Measurement>,
        factors_for: impl Fn(f64) -> FactorPair,
    ) -> Result<CoordinateResult> {
        let mut best: Option<(f64, f64)> = None;
        let mut trials = 0;
        for value in self.config.range.iter() {
            let factors = factors_for(value);
            let output = self.simulator.run(factors)?;
            trials += 1;

            let measurement = match (parse_measurement(&output)?, *last) {
                (Some(measurement), _) => measurement,
                (None, Some(previous)) if self.config.missing_marker == MissingMarkerPolicy::ReuseLast => {
                    warn!("No measurement for factors {}, reusing the previous one", factors);
                    previous
                }
                (None, _) => {
                    return Err(CalibrationError::MissingMarker {
                        factors: factors.to_string(),
                    })
                }
            };
            *last = Some(measurement);

            let diff = (phase.pick(&measurement) - actual).abs();
            match best {
                Some((_, best_diff)) if diff > best_diff => break,
                _ => best = Some((value, diff)),
            }
        }

        let (value, diff) =
            best.ok_or_else(|| CalibrationError::Config("greedy search range has no values".to_string()))?;
        Ok(CoordinateResult { value, diff, trials })
    }
}
