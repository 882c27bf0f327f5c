//! Fixed-width text reports of ranked trial results.
//!
//! A report starts with a sentence describing the ordering and a blank line, followed by a column header
//! and one right-aligned row per trial. Header and rows share the same column widths.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    ranking::{rank, RankKey},
    record::{RawTiming, TrialResult},
};

/// Shown instead of a metric when the workload has no ground truth.
pub const NOT_AVAILABLE: &str = "n/a";
/// Shown instead of an actual time when the workload has no ground truth.
pub const UNKNOWN: &str = "unknown";

const PAIR_COLUMNS: [(&str, usize); 4] = [
    ("map_cf , reduce_cf", 20),
    ("sim_map , actual_map", 24),
    ("sim_reduce , actual_reduce", 28),
    ("sim_elap , actual_elap", 26),
];
const SUM_COLUMN: (&str, usize) = ("sum_of_diffs", 13);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    PercentDifference,
    SimulationError,
    SumOfDifferences,
}

impl ReportKind {
    /// Reports written when none are configured.
    pub const DEFAULT: [ReportKind; 2] = [ReportKind::PercentDifference, ReportKind::SimulationError];

    pub fn keys(&self) -> &'static [RankKey] {
        match self {
            ReportKind::PercentDifference => &[RankKey::PercentDifference, RankKey::SimulationError],
            ReportKind::SimulationError => &[RankKey::SimulationError, RankKey::PercentDifference],
            ReportKind::SumOfDifferences => &[RankKey::SumOfDifferences, RankKey::PercentDifference],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::PercentDifference => "Percent Difference",
            ReportKind::SimulationError => "Simulation Error",
            ReportKind::SumOfDifferences => "Sum of Differences",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ReportKind::PercentDifference => {
                "ordered by lowest SUM OF DIFFERENCES AS PERCENTAGE OF MEASURED EXECUTION TIME \
                 (sum_of_diffs / actual_elap)"
            }
            ReportKind::SimulationError => {
                "ordered by lowest absolute SIMULATION ERROR (|sim_elap - actual_elap| / actual_elap)"
            }
            ReportKind::SumOfDifferences => {
                "ordered by lowest SUM OF DIFFERENCES in seconds \
                 (|sim_map - actual_map| + |sim_reduce - actual_reduce| + |sim_elap - actual_elap|)"
            }
        }
    }

    /// The two percentage columns in front of every row, ranking metric first.
    fn metric_columns(&self) -> [(&'static str, RankKey, usize); 2] {
        let percent = ("percent_diff(%)", RankKey::PercentDifference, 15);
        let error = ("sim_err(%)", RankKey::SimulationError, 12);
        match self {
            ReportKind::SimulationError => [error, percent],
            ReportKind::PercentDifference | ReportKind::SumOfDifferences => [percent, error],
        }
    }

    pub fn file_name(&self, workload: Option<&str>) -> String {
        match workload {
            Some(workload) => format!("{} Ranked by {}.txt", workload, self.title()),
            None => format!("Ranked by {}.txt", self.title()),
        }
    }
}

fn percent(result: &TrialResult, key: RankKey) -> String {
    // The error column keeps its sign even though ranking uses the magnitude.
    let value = match key {
        RankKey::SimulationError => result.simulation_error(),
        _ => key.value(result),
    };
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |value| format!("{:.2}", value * 100.))
}

fn timing(timing: &RawTiming, known: bool) -> String {
    let actual = if known { timing.actual.as_str() } else { UNKNOWN };
    format!("{} , {}", timing.simulated, actual)
}

/// Renders already ranked results.
pub fn render_report(kind: ReportKind, results: &[TrialResult], workload: Option<&str>) -> String {
    let mut out = String::new();
    match workload {
        Some(workload) => {
            let _ = writeln!(out, "Search results for workload {} {}", workload, kind.description());
        }
        None => {
            let _ = writeln!(out, "Search results {}", kind.description());
        }
    }
    out.push('\n');

    let metric_columns = kind.metric_columns();
    let header = metric_columns
        .iter()
        .map(|(name, _, width)| format!("{:>width$}", name, width = width))
        .chain(
            PAIR_COLUMNS
                .iter()
                .chain(std::iter::once(&SUM_COLUMN))
                .map(|(name, width)| format!("{:>width$}", name, width = width)),
        )
        .collect::<Vec<_>>()
        .join(" ");
    out.push_str(&header);
    out.push('\n');

    for result in results {
        let known = result.has_ground_truth();
        let cells = [
            format!("{} , {}", result.map_factor_text, result.reduce_factor_text),
            timing(&result.map, known),
            timing(&result.reduce, known),
            timing(&result.elapsed, known),
        ];
        let sum = if known {
            format!("{:.2}", result.sum_of_differences)
        } else {
            NOT_AVAILABLE.to_string()
        };
        let row = metric_columns
            .iter()
            .map(|(_, key, width)| format!("{:>width$}", percent(result, *key), width = width))
            .chain(
                cells
                    .iter()
                    .zip(PAIR_COLUMNS.iter())
                    .map(|(cell, (_, width))| format!("{:>width$}", cell, width = width)),
            )
            .chain(std::iter::once(format!("{:>width$}", sum, width = SUM_COLUMN.1)))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

/// Writes a report over `path`, discarding any previous content.
pub fn write_report<P: AsRef<Path>>(
    path: P,
    kind: ReportKind,
    results: &[TrialResult],
    workload: Option<&str>,
) -> Result<()> {
    fs::write(&path, render_report(kind, results, workload)).map_err(|e| CalibrationError::io(path.as_ref(), e))
}

/// Ranks `results` for every kind and writes one report per kind into `dir`.
pub fn write_reports(
    dir: &Path,
    kinds: &[ReportKind],
    results: &[TrialResult],
    workload: Option<&str>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| CalibrationError::io(dir, e))?;
    let mut written = Vec::with_capacity(kinds.len());
    for kind in kinds {
        info!("Ranking by the {}...", kind.title());
        let ranked = rank(results.to_vec(), kind.keys());
        let path = dir.join(kind.file_name(workload));
        write_report(&path, *kind, &ranked, workload)?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
