//! Measured phase durations of real cluster runs.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    workload::WorkloadConfig,
};

/// Average map task time, average reduce task time and total execution time of a real run, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub map: f64,
    pub reduce: f64,
    pub elapsed: f64,
}

/// Ground truth keyed by [WorkloadConfig::id].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruthTable {
    entries: BTreeMap<String, GroundTruth>,
}

impl GroundTruthTable {
    /// Measurements taken on the four-worker Raspberry Pi cluster with 512MB of input.
    pub fn builtin() -> Self {
        let rows = [
            ("512-32-4", 438., 672., 1172.),
            ("512-32-8", 432., 338., 833.),
            ("512-32-16", 425., 187., 682.),
            ("512-64-4", 833., 664., 1562.),
            ("512-64-8", 821., 342., 1221.),
            ("512-64-16", 809., 184., 1126.),
            ("512-128-4", 1638., 667., 2237.),
            ("512-128-8", 1616., 338., 2031.),
            ("512-128-16", 998., 183., 1851.),
        ];
        Self {
            entries: rows
                .into_iter()
                .map(|(id, map, reduce, elapsed)| (id.to_string(), GroundTruth { map, reduce, elapsed }))
                .collect(),
        }
    }

    /// Reads a YAML mapping `id: {map, reduce, elapsed}`.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path).map_err(|e| CalibrationError::io(path.as_ref(), e))?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Adds entries from `other`, replacing existing ones with the same id.
    pub fn extend(&mut self, other: GroundTruthTable) {
        self.entries.extend(other.entries);
    }

    pub fn insert(&mut self, workload: &WorkloadConfig, truth: GroundTruth) {
        self.entries.insert(workload.id(), truth);
    }

    /// `None` if the workload was never measured. Callers must not substitute zeros.
    pub fn lookup(&self, workload: &WorkloadConfig) -> Option<GroundTruth> {
        self.entries.get(&workload.id()).copied()
    }

    pub fn require(&self, workload: &WorkloadConfig) -> Result<GroundTruth> {
        self.lookup(workload).ok_or_else(|| CalibrationError::MissingGroundTruth {
            workload: workload.id(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
