//! Records in the shared simulator log.
//!
//! Every simulator invocation appends one whitespace-separated line to the log. Two generations of the
//! simulator write different column orders, so the layout is declared up front with [LogSchema] instead
//! of being guessed from the number of columns.

use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    grid::FactorPair,
    metrics::{ErrorMetrics, TimingPair},
};

/// Token present in the column header line of every schema.
pub const HEADER_MARKER: &str = "map_cf";

/// Column order of the shared log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSchema {
    /// `map_cf reduce_cf sim_map actual_map sim_reduce actual_reduce sim_elap actual_elap sim_err sum_of_diffs percent_diff`
    #[default]
    FactorsFirst,
    /// `sum_of_diffs sim_err map_cf reduce_cf sim_map actual_map sim_reduce actual_reduce sim_elap actual_elap`
    MetricsFirst,
}

struct Columns {
    count: usize,
    map_cf: usize,
    reduce_cf: usize,
    timings: usize,
    sim_err: usize,
    sum_of_diffs: usize,
    percent_diff: Option<usize>,
}

impl LogSchema {
    fn columns(&self) -> Columns {
        match self {
            LogSchema::FactorsFirst => Columns {
                count: 11,
                map_cf: 0,
                reduce_cf: 1,
                timings: 2,
                sim_err: 8,
                sum_of_diffs: 9,
                percent_diff: Some(10),
            },
            LogSchema::MetricsFirst => Columns {
                count: 10,
                map_cf: 2,
                reduce_cf: 3,
                timings: 4,
                sim_err: 1,
                sum_of_diffs: 0,
                percent_diff: None,
            },
        }
    }

    pub fn field_count(&self) -> usize {
        self.columns().count
    }

    /// Column header written as the first line of a fresh log.
    pub fn header(&self) -> &'static str {
        match self {
            LogSchema::FactorsFirst => {
                "map_cf reduce_cf sim_map actual_map sim_reduce actual_reduce sim_elap actual_elap sim_err sum_of_diffs percent_diff"
            }
            LogSchema::MetricsFirst => {
                "sum_of_diffs sim_err map_cf reduce_cf sim_map actual_map sim_reduce actual_reduce sim_elap actual_elap"
            }
        }
    }

    /// Parses one log line.
    ///
    /// Header and blank lines are skipped. Anything else must be a complete record: a wrong column count
    /// or an unparsable number is a [MalformedRecord](CalibrationError::MalformedRecord), never a zero.
    pub fn parse(&self, line: &str) -> Result<ParsedLine> {
        let line = line.trim();
        if line.is_empty() || line.contains(HEADER_MARKER) {
            return Ok(ParsedLine::Skip);
        }

        let columns = self.columns();
        let fields = line.split_whitespace().collect::<Vec<_>>();
        if fields.len() != columns.count {
            return Err(CalibrationError::malformed(
                line,
                format!("expected {} fields, found {}", columns.count, fields.len()),
            ));
        }

        let number = |index: usize, name: &str| -> Result<f64> {
            fields[index]
                .parse::<f64>()
                .map_err(|_| CalibrationError::malformed(line, format!("{name} `{}` is not a number", fields[index])))
        };

        let factors = FactorPair::new(number(columns.map_cf, "map_cf")?, number(columns.reduce_cf, "reduce_cf")?);
        let timing = |offset: usize| RawTiming {
            simulated: fields[columns.timings + offset].to_string(),
            actual: fields[columns.timings + offset + 1].to_string(),
        };
        let (map, reduce, elapsed) = (timing(0), timing(2), timing(4));

        let elapsed_values = elapsed
            .values()
            .map_err(|reason| CalibrationError::malformed(line, reason))?;
        let sim_err = number(columns.sim_err, "sim_err")?;
        let sum_of_differences = number(columns.sum_of_diffs, "sum_of_diffs")?;
        let percent_diff = columns
            .percent_diff
            .map(|index| number(index, "percent_diff"))
            .transpose()?;

        let metrics = if elapsed_values.actual == 0.0 {
            None
        } else {
            Some(ErrorMetrics {
                simulation_error: sim_err / 100.,
                sum_of_differences,
                percent_difference: match percent_diff {
                    Some(percent) => percent / 100.,
                    None => sum_of_differences / elapsed_values.actual,
                },
            })
        };

        Ok(ParsedLine::Trial(TrialResult {
            factors,
            map_factor_text: fields[columns.map_cf].to_string(),
            reduce_factor_text: fields[columns.reduce_cf].to_string(),
            map,
            reduce,
            elapsed,
            sum_of_differences,
            metrics,
        }))
    }

    /// Factor columns of a line that may otherwise be malformed.
    pub fn factors_of(&self, line: &str) -> Option<FactorPair> {
        let columns = self.columns();
        let fields = line.split_whitespace().collect::<Vec<_>>();
        let map_factor = fields.get(columns.map_cf)?.parse().ok()?;
        let reduce_factor = fields.get(columns.reduce_cf)?.parse().ok()?;
        Some(FactorPair::new(map_factor, reduce_factor))
    }

    /// Writes `result` in this schema, the way the simulator would.
    pub fn format_record(&self, result: &TrialResult) -> String {
        let (sim_err, percent_diff) = match &result.metrics {
            Some(metrics) => (metrics.simulation_error * 100., metrics.percent_difference * 100.),
            None => (0., 0.),
        };
        let timings = [
            result.map.simulated.as_str(),
            result.map.actual.as_str(),
            result.reduce.simulated.as_str(),
            result.reduce.actual.as_str(),
            result.elapsed.simulated.as_str(),
            result.elapsed.actual.as_str(),
        ]
        .join(" ");
        match self {
            LogSchema::FactorsFirst => format!(
                "{} {} {} {:.2} {:.2} {:.2}",
                result.map_factor_text,
                result.reduce_factor_text,
                timings,
                sim_err,
                result.sum_of_differences,
                percent_diff
            ),
            LogSchema::MetricsFirst => format!(
                "{:.2} {:.2} {} {} {}",
                result.sum_of_differences, sim_err, result.map_factor_text, result.reduce_factor_text, timings
            ),
        }
    }
}

/// Outcome of parsing one log line.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLine {
    Trial(TrialResult),
    Skip,
}

/// Simulated and actual duration of a phase, as printed by the simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawTiming {
    pub simulated: String,
    pub actual: String,
}

impl RawTiming {
    pub fn new(simulated: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            simulated: simulated.into(),
            actual: actual.into(),
        }
    }

    pub fn values(&self) -> std::result::Result<TimingPair, String> {
        let parse = |text: &str| text.parse::<f64>().map_err(|_| format!("timing `{text}` is not a number"));
        Ok(TimingPair::new(parse(&self.simulated)?, parse(&self.actual)?))
    }
}

/// One simulator invocation as recorded in the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub factors: FactorPair,
    pub map_factor_text: String,
    pub reduce_factor_text: String,
    pub map: RawTiming,
    pub reduce: RawTiming,
    pub elapsed: RawTiming,
    /// Absolute difference in seconds, available with or without ground truth.
    pub sum_of_differences: f64,
    /// `None` when the simulator had no ground truth for the workload (actual elapsed time of zero).
    pub metrics: Option<ErrorMetrics>,
}

impl TrialResult {
    /// Builds a result from numeric timings, computing the metrics. Used when the log must be produced
    /// rather than read.
    pub fn from_timings(factors: FactorPair, map: TimingPair, reduce: TimingPair, elapsed: TimingPair) -> Self {
        let metrics = ErrorMetrics::compute(map, reduce, elapsed, "").ok();
        let sum_of_differences = map.abs_diff() + reduce.abs_diff() + elapsed.abs_diff();
        let text = |timing: TimingPair| {
            RawTiming::new(format!("{:.2}", timing.simulated), format!("{:.2}", timing.actual))
        };
        Self {
            factors,
            map_factor_text: format!("{:.2}", factors.map_factor),
            reduce_factor_text: format!("{:.2}", factors.reduce_factor),
            map: text(map),
            reduce: text(reduce),
            elapsed: text(elapsed),
            sum_of_differences,
            metrics,
        }
    }

    pub fn has_ground_truth(&self) -> bool {
        self.metrics.is_some()
    }

    pub fn simulation_error(&self) -> Option<f64> {
        self.metrics.map(|m| m.simulation_error)
    }

    pub fn percent_difference(&self) -> Option<f64> {
        self.metrics.map(|m| m.percent_difference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = "0.95 1.02 441.13 438.00 668.40 672.00 1178.62 1172.00 0.56 13.35 1.14";

    #[test]
    fn parses_factors_first() {
        let ParsedLine::Trial(result) = LogSchema::FactorsFirst.parse(RECORD).unwrap() else {
            panic!("record was skipped");
        };
        assert_eq!(result.factors, FactorPair::new(0.95, 1.02));
        assert_eq!(result.map, RawTiming::new("441.13", "438.00"));
        assert_eq!(result.elapsed.actual, "1172.00");
        let metrics = result.metrics.unwrap();
        assert!((metrics.simulation_error - 0.0056).abs() < 1e-12);
        assert!((metrics.percent_difference - 0.0114).abs() < 1e-12);
        assert!((metrics.sum_of_differences - 13.35).abs() < 1e-12);
    }

    #[test]
    fn metrics_first_derives_percent_difference() {
        let line = "117.20 10.00 0.90 1.10 500.00 438.00 727.20 672.00 1289.20 1172.00";
        let ParsedLine::Trial(result) = LogSchema::MetricsFirst.parse(line).unwrap() else {
            panic!("record was skipped");
        };
        assert_eq!(result.factors, FactorPair::new(0.9, 1.1));
        let metrics = result.metrics.unwrap();
        assert!((metrics.percent_difference - 0.1).abs() < 1e-12);
        assert!((metrics.simulation_error - 0.1).abs() < 1e-12);
    }

    #[test]
    fn header_and_blank_lines_are_skipped() {
        for schema in [LogSchema::FactorsFirst, LogSchema::MetricsFirst] {
            assert_eq!(schema.parse(schema.header()).unwrap(), ParsedLine::Skip);
            assert_eq!(schema.parse("   ").unwrap(), ParsedLine::Skip);
        }
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let err = LogSchema::MetricsFirst.parse(RECORD).unwrap_err();
        assert!(matches!(err, CalibrationError::MalformedRecord { .. }));
    }

    #[test]
    fn zero_actual_elapsed_has_no_metrics() {
        let line = "1.00 1.00 441.13 0.00 668.40 0.00 1178.62 0.00 inf 0.00 inf";
        let ParsedLine::Trial(result) = LogSchema::FactorsFirst.parse(line).unwrap() else {
            panic!("record was skipped");
        };
        assert!(!result.has_ground_truth());
        assert_eq!(result.percent_difference(), None);
    }
}
