//! Description of a calibration run, loadable from YAML.
//!
//! Every field has a default matching the classic setup: `./HDMSG` run in the current directory with
//! `config` and `picluster.xml`, writing `HDMSG_output.txt`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    greedy::GreedyConfig,
    grid::{FactorGrid, FactorRange},
    ground_truth::GroundTruthTable,
    record::LogSchema,
    report::ReportKind,
    runner::Scheduling,
    simulator::ExternalSimulator,
    validation::ValidationConfig,
    workload::WorkloadConfig,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub simulator: ExternalSimulator,
    /// Shared log the simulator appends to. Relative paths are resolved against the simulator's
    /// working directory.
    pub log_path: PathBuf,
    pub schema: LogSchema,
    pub scheduling: Scheduling,
    pub grid: FactorGrid,
    pub greedy: GreedyConfig,
    pub validation: ValidationConfig,
    /// Directory for report files.
    pub output_dir: PathBuf,
    pub reports: Vec<ReportKind>,
    /// Exclude trials whose absolute simulation error (a fraction) reaches this value from ranking.
    pub max_simulation_error: Option<f64>,
    /// YAML file with ground truth added on top of the built-in table.
    pub ground_truth: Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            simulator: ExternalSimulator {
                binary: PathBuf::from("./HDMSG"),
                workload_config: Some(PathBuf::from("config")),
                topology: Some(PathBuf::from("picluster.xml")),
                working_dir: None,
            },
            log_path: PathBuf::from("HDMSG_output.txt"),
            schema: LogSchema::default(),
            scheduling: Scheduling::default(),
            grid: FactorGrid::default(),
            greedy: GreedyConfig::default(),
            validation: ValidationConfig::default(),
            output_dir: PathBuf::from("."),
            reports: ReportKind::DEFAULT.to_vec(),
            max_simulation_error: None,
            ground_truth: None,
        }
    }
}

impl CalibrationConfig {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path).map_err(|e| CalibrationError::io(path.as_ref(), e))?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduling.max_in_flight() == 0 {
            return Err(CalibrationError::Config(
                "scheduling must allow at least one trial in flight".to_string(),
            ));
        }
        check_range("grid.map", &self.grid.map)?;
        check_range("grid.reduce", &self.grid.reduce)?;
        check_range("greedy.range", &self.greedy.range)?;
        if let Some(max) = self.max_simulation_error {
            if max.is_nan() || max <= 0.0 {
                return Err(CalibrationError::Config(format!(
                    "max_simulation_error must be positive, got {max}"
                )));
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.simulator.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn resolved_log_path(&self) -> PathBuf {
        self.resolve(&self.log_path)
    }

    pub fn workload_path(&self) -> Result<PathBuf> {
        self.simulator
            .workload_config
            .as_deref()
            .map(|path| self.resolve(path))
            .ok_or_else(|| CalibrationError::Config("simulator.workload_config is not set".to_string()))
    }

    pub fn workload(&self) -> Result<WorkloadConfig> {
        WorkloadConfig::from_file(self.workload_path()?)
    }

    /// Built-in ground truth, extended with [ground_truth](CalibrationConfig::ground_truth) if set.
    pub fn ground_truth_table(&self) -> Result<GroundTruthTable> {
        let mut table = GroundTruthTable::builtin();
        if let Some(path) = &self.ground_truth {
            table.extend(GroundTruthTable::from_yaml(path)?);
        }
        Ok(table)
    }
}

fn check_range(name: &str, range: &FactorRange) -> Result<()> {
    if range.step.is_finite() && range.step > 0.0 && range.start <= range.end {
        Ok(())
    } else {
        Err(CalibrationError::Config(format!(
            "{name} must have start <= end and a positive step, got {} to {} step {}",
            range.start, range.end, range.step
        )))
    }
}
