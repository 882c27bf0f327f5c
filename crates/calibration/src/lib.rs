//! Calibration of MapReduce simulator factors against measured cluster runs.
//!
//! The simulator is an external binary taking a map and a reduce calibration factor. Two searches are
//! provided: an exhaustive grid search ([runner]) that runs many simulator processes at once and ranks
//! every factor pair ([ranking], [report]), and a greedy per-factor search ([greedy]).

pub mod config;
pub mod error;
pub mod greedy;
pub mod grid;
pub mod ground_truth;
pub mod ledger;
pub mod metrics;
pub mod ranking;
pub mod record;
pub mod report;
pub mod runner;
pub mod simulator;
pub mod validation;
pub mod workload;
