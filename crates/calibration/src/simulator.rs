//! Launching simulator trials.

use std::{
    path::PathBuf,
    process::{Child, Command, Stdio},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CalibrationError, Result},
    grid::FactorPair,
};

/// A trial that has been started and not yet waited for.
pub trait TrialProcess: Send {
    /// Blocks until the trial terminates. Returns its exit code, `None` if it was killed by a signal.
    fn wait(self: Box<Self>) -> Result<Option<i32>>;
}

/// Something that can run the simulator for a factor pair.
pub trait Simulator: Send + Sync {
    /// Starts a trial without waiting for it. Its console output is discarded; the measurement is
    /// appended to the shared log by the simulator itself.
    fn spawn(&self, factors: FactorPair) -> Result<Box<dyn TrialProcess>>;

    /// Runs a trial to completion and returns everything it printed.
    fn run(&self, factors: FactorPair) -> Result<String>;
}

/// Invocation of the simulator binary: `<binary> <map> <reduce> [config] [topology]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExternalSimulator {
    pub binary: PathBuf,
    #[serde(default)]
    pub workload_config: Option<PathBuf>,
    #[serde(default)]
    pub topology: Option<PathBuf>,
    /// Directory the simulator runs in, which is also where it writes its log.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl ExternalSimulator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workload_config: None,
            topology: None,
            working_dir: None,
        }
    }

    fn command(&self, factors: FactorPair) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(factors.map_factor.to_string())
            .arg(factors.reduce_factor.to_string());
        if let Some(config) = &self.workload_config {
            command.arg(config);
            if let Some(topology) = &self.topology {
                command.arg(topology);
            }
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        debug!("{:?}", command);
        command
    }
}

struct ChildTrial {
    child: Child,
    binary: PathBuf,
}

impl TrialProcess for ChildTrial {
    fn wait(mut self: Box<Self>) -> Result<Option<i32>> {
        let status = self.child.wait().map_err(|e| CalibrationError::io(&self.binary, e))?;
        Ok(status.code())
    }
}

impl Simulator for ExternalSimulator {
    fn spawn(&self, factors: FactorPair) -> Result<Box<dyn TrialProcess>> {
        let child = self
            .command(factors)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CalibrationError::io(&self.binary, e))?;
        Ok(Box::new(ChildTrial {
            child,
            binary: self.binary.clone(),
        }))
    }

    fn run(&self, factors: FactorPair) -> Result<String> {
        let output = self
            .command(factors)
            .output()
            .map_err(|e| CalibrationError::io(&self.binary, e))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}
