use std::{fs::File, io::Write, path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{warn, LevelFilter};
use mr_calibration::{
    config::CalibrationConfig,
    error::{CalibrationError, Result},
    greedy::{GreedySearch, MissingMarkerPolicy},
    ranking::apply_quality_floor,
    report::write_reports,
    runner::{Scheduling, TrialRunner},
    simulator::Simulator,
    validation::{render_validation, run_validation},
};

/// Calibrates map and reduce factors of the MapReduce simulator.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config. Defaults are used for everything it leaves out.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder for report files.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Log debug messages, including every simulator command.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs every factor pair of the grid and writes ranked reports.
    Exhaustive {
        /// Trials launched together before waiting for all of them.
        #[arg(long, conflicts_with = "workers")]
        batch_size: Option<usize>,

        /// Use a pool of this many workers instead of batches.
        #[arg(long)]
        workers: Option<usize>,

        /// Exclude trials whose absolute simulation error (fraction) reaches this value.
        #[arg(long)]
        max_sim_error: Option<f64>,

        /// Also write the state of every trial as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Searches each factor separately, stopping once the error grows.
    Greedy {
        /// Reuse the previous measurement when a trial prints none, instead of failing.
        #[arg(long)]
        reuse_last_measurement: bool,
    },
    /// Runs the configured factors against every configured workload.
    Validate,
}

fn exhaustive(config: &CalibrationConfig, json: Option<PathBuf>) -> Result<()> {
    let workload = match config.workload() {
        Ok(workload) => Some(workload),
        Err(err) => {
            warn!("Can't read workload: {}", err);
            None
        }
    };
    if let Some(workload) = &workload {
        println!("Configuration: {}", workload);
        if config.ground_truth_table()?.lookup(workload).is_none() {
            warn!("No ground truth for workload {}, metrics will be reported as n/a", workload);
        }
    }

    let simulator: Arc<dyn Simulator> = Arc::new(config.simulator.clone());
    let runner = TrialRunner::new(simulator, config.resolved_log_path(), config.schema, config.scheduling);
    let ledger = runner.run(&config.grid.pairs())?;

    let summary = ledger.summary();
    println!("{} of {} trials completed", summary.completed, summary.total);
    for (factors, failure) in ledger.failed() {
        warn!("Trial {} failed: {:?}", factors, failure);
    }

    if let Some(path) = json {
        let file = File::create(&path).map_err(|e| CalibrationError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::to_writer_pretty(file, &ledger).map_err(|e| CalibrationError::Io { path, source: e.into() })?;
    }

    let results = apply_quality_floor(ledger.completed(), config.max_simulation_error);
    let workload_id = workload.map(|workload| workload.id());
    write_reports(&config.output_dir, &config.reports, &results, workload_id.as_deref())?;
    println!("Done");
    Ok(())
}

fn greedy(config: &CalibrationConfig) -> Result<()> {
    let workload = config.workload()?;
    println!("Configuration: {}", workload);
    let truth = config.ground_truth_table()?.require(&workload)?;

    let outcome = GreedySearch::new(&config.simulator, config.greedy).run(truth)?;
    println!("Map calibration factor: {:.2}", outcome.map.value);
    println!("Reduce calibration factor: {:.2}", outcome.reduce.value);
    println!();
    println!("{}", outcome.summary);
    Ok(())
}

fn validate(config: &CalibrationConfig) -> Result<()> {
    let rows = run_validation(
        &config.simulator,
        &config.workload_path()?,
        &config.validation,
        &config.ground_truth_table()?,
    )?;
    print!("{}", render_validation(config.validation.factors, &rows));
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => CalibrationConfig::from_yaml(path)?,
        None => CalibrationConfig::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    match args.command {
        Command::Exhaustive {
            batch_size,
            workers,
            max_sim_error,
            json,
        } => {
            if let Some(size) = batch_size {
                config.scheduling = Scheduling::Batch { size };
            }
            if let Some(workers) = workers {
                config.scheduling = Scheduling::Pool { workers };
            }
            if max_sim_error.is_some() {
                config.max_simulation_error = max_sim_error;
            }
            config.validate()?;
            exhaustive(&config, json)
        }
        Command::Greedy { reuse_last_measurement } => {
            if reuse_last_measurement {
                config.greedy.missing_marker = MissingMarkerPolicy::ReuseLast;
            }
            greedy(&config)
        }
        Command::Validate => validate(&config),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    Builder::new()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
