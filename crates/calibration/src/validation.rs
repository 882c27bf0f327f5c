//! Checking one factor pair against many workloads.
//!
//! For every workload the simulator's config file is rewritten in place and a single trial is run. The
//! original file content is restored afterwards, also when a trial fails.

use std::{fmt::Write as _, fs, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    greedy::{parse_measurement, Measurement},
    grid::FactorPair,
    ground_truth::GroundTruthTable,
    metrics::{ErrorMetrics, TimingPair},
    simulator::Simulator,
    workload::WorkloadConfig,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub factors: FactorPair,
    pub workloads: Vec<WorkloadConfig>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let mut workloads = vec![
            WorkloadConfig::new(256, 32, 4),
            WorkloadConfig::new(256, 32, 8),
            WorkloadConfig::new(256, 32, 16),
            WorkloadConfig::new(256, 64, 4),
            WorkloadConfig::new(256, 64, 8),
            WorkloadConfig::new(256, 64, 16),
        ];
        for chunk_size in [32, 64, 128] {
            for reducers in [4, 8, 16] {
                workloads.push(WorkloadConfig::new(512, chunk_size, reducers));
            }
        }
        Self {
            factors: FactorPair::new(0.95, 1.02),
            workloads,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ValidationRow {
    pub workload: WorkloadConfig,
    /// `None` if the trial printed no measurement.
    #[serde(skip)]
    pub measurement: Option<Measurement>,
    /// `None` without ground truth or without a simulated job time.
    pub metrics: Option<ErrorMetrics>,
}

/// Runs `config.factors` once per workload, rewriting `workload_path` before each trial.
pub fn run_validation(
    simulator: &dyn Simulator,
    workload_path: &Path,
    config: &ValidationConfig,
    ground_truth: &GroundTruthTable,
) -> Result<Vec<ValidationRow>> {
    let template = fs::read_to_string(workload_path).map_err(|e| CalibrationError::io(workload_path, e))?;
    let rows = config
        .workloads
        .iter()
        .map(|workload| validate_one(simulator, workload_path, &template, config.factors, workload, ground_truth))
        .collect::<Result<Vec<_>>>();
    fs::write(workload_path, &template).map_err(|e| CalibrationError::io(workload_path, e))?;
    rows
}

fn validate_one(
    simulator: &dyn Simulator,
    workload_path: &Path,
    template: &str,
    factors: FactorPair,
    workload: &WorkloadConfig,
    ground_truth: &GroundTruthTable,
) -> Result<ValidationRow> {
    workload.write_over(workload_path, template)?;
    info!("Running workload {}", workload);
    let output = simulator.run(factors)?;
    let measurement = match parse_measurement(&output) {
        Ok(measurement) => measurement,
        Err(err) => {
            warn!("Workload {}: {}", workload, err);
            None
        }
    };
    let metrics = match (measurement, ground_truth.lookup(workload)) {
        (Some(measurement), Some(truth)) => measurement.elapsed.and_then(|elapsed| {
            ErrorMetrics::compute(
                TimingPair::new(measurement.map, truth.map),
                TimingPair::new(measurement.reduce, truth.reduce),
                TimingPair::new(elapsed, truth.elapsed),
                &workload.id(),
            )
            .ok()
        }),
        _ => None,
    };
    Ok(ValidationRow {
        workload: *workload,
        measurement,
        metrics,
    })
}

/// Tab-separated table, one row per workload.
pub fn render_validation(factors: FactorPair, rows: &[ValidationRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Calibration factors: {}", factors);
    let _ = writeln!(out);
    let _ = writeln!(out, "Config\t\tMap\t\tReduce\t\tSim_Time\tSim_Err(%)\tPercent_Diff(%)");
    for row in rows {
        let number = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |value| format!("{:.2}", value));
        let _ = writeln!(
            out,
            "{}\t{}\t\t{}\t\t{}\t\t{}\t\t{}",
            row.workload,
            number(row.measurement.map(|m| m.map)),
            number(row.measurement.map(|m| m.reduce)),
            number(row.measurement.and_then(|m| m.elapsed)),
            number(row.metrics.map(|m| m.simulation_error * 100.)),
            number(row.metrics.map(|m| m.percent_difference * 100.)),
        );
    }
    out
}
