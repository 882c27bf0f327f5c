//! Workload description shared with the simulator.
//!
//! The simulator reads a line-oriented `key value` file. Only three keys matter here. Every other line
//! (hosts, mappers, ...) belongs to the simulator and is preserved untouched when the file is rewritten.

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, Result};

const INPUT_SIZE_KEY: &str = "input_size_in_mb";
const CHUNK_SIZE_KEY: &str = "hdfs_chunk_size_in_mb";
const REDUCERS_KEY: &str = "reducers";

/// Input size, DFS chunk size and reducer count of a MapReduce job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub input_size_mb: u64,
    pub chunk_size_mb: u64,
    pub reducer_count: u64,
}

impl WorkloadConfig {
    pub fn new(input_size_mb: u64, chunk_size_mb: u64, reducer_count: u64) -> Self {
        Self {
            input_size_mb,
            chunk_size_mb,
            reducer_count,
        }
    }

    /// Identity used for ground-truth lookup, e.g. `512-32-4`.
    pub fn id(&self) -> String {
        format!("{}-{}-{}", self.input_size_mb, self.chunk_size_mb, self.reducer_count)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut input_size = None;
        let mut chunk_size = None;
        let mut reducers = None;
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let slot = match tokens.next() {
                Some(INPUT_SIZE_KEY) => &mut input_size,
                Some(CHUNK_SIZE_KEY) => &mut chunk_size,
                Some(REDUCERS_KEY) => &mut reducers,
                _ => continue,
            };
            let value = tokens
                .next()
                .ok_or_else(|| CalibrationError::Config(format!("missing value in line `{line}`")))?;
            *slot = Some(
                value
                    .parse::<u64>()
                    .map_err(|e| CalibrationError::Config(format!("bad value in line `{line}`: {e}")))?,
            );
        }
        let require = |value: Option<u64>, key: &str| {
            value.ok_or_else(|| CalibrationError::Config(format!("workload config has no `{key}` line")))
        };
        Ok(Self {
            input_size_mb: require(input_size, INPUT_SIZE_KEY)?,
            chunk_size_mb: require(chunk_size, CHUNK_SIZE_KEY)?,
            reducer_count: require(reducers, REDUCERS_KEY)?,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path).map_err(|e| CalibrationError::io(path.as_ref(), e))?;
        Self::parse(&text)
    }

    /// Replaces the three workload keys in `template`, keeping all other lines in order.
    ///
    /// Keys absent from the template are appended at the end.
    pub fn apply_to(&self, template: &str) -> String {
        let mut pending = vec![
            (INPUT_SIZE_KEY, self.input_size_mb),
            (CHUNK_SIZE_KEY, self.chunk_size_mb),
            (REDUCERS_KEY, self.reducer_count),
        ];
        let mut lines = Vec::new();
        for line in template.lines() {
            let key = line.split_whitespace().next();
            match pending.iter().position(|(k, _)| Some(*k) == key) {
                Some(i) => {
                    let (key, value) = pending.remove(i);
                    lines.push(format!("{key} {value}"));
                }
                None => lines.push(line.to_string()),
            }
        }
        lines.extend(pending.into_iter().map(|(key, value)| format!("{key} {value}")));
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    pub fn write_over<P: AsRef<Path>>(&self, path: P, template: &str) -> Result<()> {
        fs::write(&path, self.apply_to(template)).map_err(|e| CalibrationError::io(path.as_ref(), e))
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}
