//! Exhaustive grid search with a bounded number of simulator processes in flight.

use std::{
    fs::File,
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    time::Instant,
};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use crate::{
    error::{CalibrationError, Result},
    grid::FactorPair,
    ledger::TrialLedger,
    record::LogSchema,
    simulator::{Simulator, TrialProcess},
};

/// How trials are spread over simulator processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Scheduling {
    /// Launch `size` trials, wait for all of them, then launch the next group.
    ///
    /// Peak concurrency is `size`, but it drops to zero between groups.
    Batch { size: usize },
    /// Keep `workers` trials running until the queue is empty.
    ///
    /// Same peak as a batch of `workers`, with a higher average utilization.
    Pool { workers: usize },
}

impl Scheduling {
    pub fn max_in_flight(&self) -> usize {
        match self {
            Scheduling::Batch { size } => *size,
            Scheduling::Pool { workers } => *workers,
        }
    }
}

impl Default for Scheduling {
    fn default() -> Self {
        Scheduling::Batch { size: 11 }
    }
}

/// Prints `10% 20% ...` as trials are launched (batches) or finish (pool). Silent for grids with fewer
/// than 100 points.
struct Progress {
    total: usize,
    started: AtomicUsize,
}

impl Progress {
    fn new(total: usize) -> Self {
        if total >= 100 {
            print!("Progress: 0% ");
            let _ = std::io::stdout().flush();
        }
        Self {
            total,
            started: AtomicUsize::new(0),
        }
    }

    fn advance(&self) {
        let started = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        if self.total < 100 {
            return;
        }
        let decile = started * 10 / self.total;
        if decile > (started - 1) * 10 / self.total {
            print!("{}% ", decile * 10);
            let _ = std::io::stdout().flush();
        }
    }

    fn finish(&self) {
        if self.total >= 100 {
            println!();
        }
    }
}

pub struct TrialRunner {
    simulator: Arc<dyn Simulator>,
    log_path: PathBuf,
    schema: LogSchema,
    scheduling: Scheduling,
}

impl TrialRunner {
    pub fn new(simulator: Arc<dyn Simulator>, log_path: PathBuf, schema: LogSchema, scheduling: Scheduling) -> Self {
        Self {
            simulator,
            log_path,
            schema,
            scheduling,
        }
    }

    /// Runs one trial per pair and returns the state of every trial.
    ///
    /// The shared log is truncated first and read only after all trials have terminated.
    pub fn run(&self, pairs: &[FactorPair]) -> Result<TrialLedger> {
        if self.scheduling.max_in_flight() == 0 {
            return Err(CalibrationError::Config(
                "at least one trial must be allowed in flight".to_string(),
            ));
        }
        self.reset_log()?;

        info!("Executing {} combinations", pairs.len());
        let start_time = Instant::now();
        let mut ledger = TrialLedger::new(pairs);
        let progress = Progress::new(pairs.len());
        match self.scheduling {
            Scheduling::Batch { size } => self.run_batches(pairs, size, &mut ledger, &progress),
            Scheduling::Pool { workers } => self.run_pool(pairs, workers, &mut ledger, &progress),
        }
        progress.finish();

        let log = std::fs::read_to_string(&self.log_path).map_err(|e| CalibrationError::io(&self.log_path, e))?;
        ledger.collect_log(self.schema, &log);
        ledger.finish();

        let summary = ledger.summary();
        info!(
            "Finished {} trials in {:.2?}: {} completed, {} failed",
            summary.total,
            start_time.elapsed(),
            summary.completed,
            summary.failed
        );
        Ok(ledger)
    }

    fn reset_log(&self) -> Result<()> {
        let mut file = File::create(&self.log_path).map_err(|e| CalibrationError::io(&self.log_path, e))?;
        writeln!(file, "{}", self.schema.header()).map_err(|e| CalibrationError::io(&self.log_path, e))
    }

    fn run_batches(&self, pairs: &[FactorPair], size: usize, ledger: &mut TrialLedger, progress: &Progress) {
        for (batch_id, batch) in pairs.chunks(size).enumerate() {
            let mut running: Vec<(usize, Box<dyn TrialProcess>)> = Vec::with_capacity(batch.len());
            for (i, factors) in batch.iter().enumerate() {
                let position = batch_id * size + i;
                match self.simulator.spawn(*factors) {
                    Ok(process) => running.push((position, process)),
                    Err(err) => {
                        warn!("Can't launch trial {}: {}", factors, err);
                        ledger.record_launch_failure(position, err.to_string());
                    }
                }
                progress.advance();
            }
            for (position, process) in running {
                match process.wait() {
                    Ok(exit_code) => ledger.record_exit(position, exit_code),
                    Err(err) => warn!("Can't wait for trial {}: {}", pairs[position], err),
                }
            }
        }
    }

    fn run_pool(&self, pairs: &[FactorPair], workers: usize, ledger: &mut TrialLedger, progress: &Progress) {
        let pool = ThreadPool::new(workers);
        let (sender, receiver) = mpsc::channel();
        for (position, factors) in pairs.iter().copied().enumerate() {
            let simulator = self.simulator.clone();
            let sender = sender.clone();
            pool.execute(move || {
                let outcome = simulator.spawn(factors).map(|process| process.wait());
                let _ = sender.send((position, outcome));
            });
        }
        drop(sender);

        for (position, outcome) in receiver {
            progress.advance();
            match outcome {
                Ok(Ok(exit_code)) => ledger.record_exit(position, exit_code),
                Ok(Err(err)) => warn!("Can't wait for trial {}: {}", pairs[position], err),
                Err(err) => {
                    warn!("Can't launch trial {}: {}", pairs[position], err);
                    ledger.record_launch_failure(position, err.to_string());
                }
            }
        }
        pool.join();
    }
}
