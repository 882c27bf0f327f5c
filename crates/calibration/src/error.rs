//! Errors produced while calibrating.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong during a calibration run.
///
/// Record-level variants ([MalformedRecord](CalibrationError::MalformedRecord),
/// [MissingGroundTruth](CalibrationError::MissingGroundTruth)) are local to one trial and are reported
/// without stopping the run. I/O failures on the shared log or on report files are fatal.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("malformed record `{line}`: {reason}")]
    MalformedRecord { line: String, reason: String },

    #[error("no ground truth for workload {workload}")]
    MissingGroundTruth { workload: String },

    #[error("simulator output for factors {factors} has no `Simulated` line")]
    MissingMarker { factors: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CalibrationError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        CalibrationError::MalformedRecord {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CalibrationError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
