//! Per-trial bookkeeping for a grid run.
//!
//! Every issued trial gets an entry the moment it is launched. Log records are matched back to entries by
//! [FactorPair::key], so the completion order of simulator processes does not matter and a trial that
//! never wrote a record stays visible as a failure instead of silently disappearing.

use std::collections::HashMap;

use log::warn;
use serde::Serialize;

use crate::{
    error::CalibrationError,
    grid::FactorPair,
    record::{LogSchema, ParsedLine, TrialResult},
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TrialFailure {
    /// The simulator process could not be started.
    LaunchFailed(String),
    /// The process terminated without appending a record to the log.
    NoOutput { exit_code: Option<i32> },
    /// A record with this trial's factors was found but could not be parsed.
    Malformed(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TrialStatus {
    Pending,
    Completed(TrialResult),
    Failed(TrialFailure),
}

#[derive(Clone, Debug, Serialize)]
pub struct TrialEntry {
    pub factors: FactorPair,
    /// Exit code reported when the process was waited for. `None` before that or after a signal.
    pub exit_code: Option<i32>,
    pub status: TrialStatus,
}

/// What happened to one log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Accepted,
    /// No trial with these factors was issued in this run.
    Unknown,
    /// The trial already has a result; the first record wins.
    Duplicate,
}

/// Counters describing the state of a ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrialLedger {
    entries: Vec<TrialEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TrialLedger {
    /// Registers every trial of the grid as pending, in grid order.
    pub fn new(pairs: &[FactorPair]) -> Self {
        let mut index = HashMap::new();
        for (i, factors) in pairs.iter().enumerate() {
            if *index.entry(factors.key()).or_insert(i) != i {
                warn!("Factors {} appear more than once in the grid", factors);
            }
        }
        let entries = pairs
            .iter()
            .map(|factors| TrialEntry {
                factors: *factors,
                exit_code: None,
                status: TrialStatus::Pending,
            })
            .collect();
        Self { entries, index }
    }

    pub fn entries(&self) -> &[TrialEntry] {
        &self.entries
    }

    pub fn get(&self, factors: &FactorPair) -> Option<&TrialEntry> {
        self.index.get(&factors.key()).map(|&i| &self.entries[i])
    }

    pub fn status(&self, factors: &FactorPair) -> Option<&TrialStatus> {
        self.get(factors).map(|entry| &entry.status)
    }

    pub fn record_exit(&mut self, position: usize, exit_code: Option<i32>) {
        self.entries[position].exit_code = exit_code;
    }

    pub fn record_launch_failure(&mut self, position: usize, reason: String) {
        self.entries[position].status = TrialStatus::Failed(TrialFailure::LaunchFailed(reason));
    }

    /// Attaches a parsed record to the pending trial with the same factors.
    pub fn record(&mut self, result: TrialResult) -> RecordOutcome {
        let Some(&position) = self.index.get(&result.factors.key()) else {
            return RecordOutcome::Unknown;
        };
        let entry = &mut self.entries[position];
        match entry.status {
            TrialStatus::Pending => {
                entry.status = TrialStatus::Completed(result);
                RecordOutcome::Accepted
            }
            _ => RecordOutcome::Duplicate,
        }
    }

    /// Matches every record of a drained log against the ledger.
    ///
    /// Problems with single lines are logged and never abort the collection.
    pub fn collect_log(&mut self, schema: LogSchema, log: &str) {
        for line in log.lines() {
            match schema.parse(line) {
                Ok(ParsedLine::Skip) => {}
                Ok(ParsedLine::Trial(result)) => {
                    let factors = result.factors;
                    match self.record(result) {
                        RecordOutcome::Accepted => {}
                        RecordOutcome::Unknown => warn!("Ignoring record for factors {} that were not issued", factors),
                        RecordOutcome::Duplicate => warn!("Ignoring duplicate record for factors {}", factors),
                    }
                }
                Err(err) => {
                    warn!("{}", err);
                    if let CalibrationError::MalformedRecord { reason, .. } = err {
                        self.mark_malformed(schema, line, reason);
                    }
                }
            }
        }
    }

    fn mark_malformed(&mut self, schema: LogSchema, line: &str, reason: String) {
        let Some(factors) = schema.factors_of(line) else {
            return;
        };
        if let Some(&position) = self.index.get(&factors.key()) {
            let entry = &mut self.entries[position];
            if entry.status == TrialStatus::Pending {
                entry.status = TrialStatus::Failed(TrialFailure::Malformed(reason));
            }
        }
    }

    /// Turns every trial still pending into a [TrialFailure::NoOutput].
    pub fn finish(&mut self) {
        for entry in self.entries.iter_mut() {
            if entry.status == TrialStatus::Pending {
                entry.status = TrialStatus::Failed(TrialFailure::NoOutput {
                    exit_code: entry.exit_code,
                });
            }
        }
    }

    /// Completed results in grid order.
    pub fn completed(&self) -> Vec<TrialResult> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.status {
                TrialStatus::Completed(result) => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&FactorPair, &TrialFailure)> {
        self.entries.iter().filter_map(|entry| match &entry.status {
            TrialStatus::Failed(failure) => Some((&entry.factors, failure)),
            _ => None,
        })
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.iter() {
            match entry.status {
                TrialStatus::Pending => summary.pending += 1,
                TrialStatus::Completed(_) => summary.completed += 1,
                TrialStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}
