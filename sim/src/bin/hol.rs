//! Single-policy runner
//!
//! Runs one workload under FCFS or SJF, prints the aggregate report and
//! writes one CSV row per task.

use clap::Parser;
use results_format::{write_json_report, CsvSink};
use sim::{banner, class_counts, logging, SimError, Simulation};
use std::path::PathBuf;
use workload::{Pacing, PolicyKind, RunConfig, WorkloadConfig, DEFAULT_CONFIG_PATH};

/// Head-of-line blocking simulator: one server, FCFS or SJF
#[derive(Parser, Debug)]
#[command(name = "hol", version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    HOL_LOG=debug   Log filter (overrides --verbose)")]
struct Cli {
    /// Scheduling algorithm: fcfs or sjf
    #[arg(short, long, default_value = "fcfs")]
    algo: PolicyKind,

    /// Workload config file (defaults apply when missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for the per-task CSV
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Skip writing the per-task CSV
    #[arg(long)]
    no_csv: bool,

    /// Also write the aggregate report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Seed for the duration draws
    #[arg(long)]
    seed: Option<u64>,

    /// Arrival pacing: anchored or relative
    #[arg(long, default_value = "anchored")]
    pacing: Pacing,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(&cli) {
        tracing::error!(error = %e, "run failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> sim::Result<()> {
    let workload = WorkloadConfig::load(&cli.config)?;
    let config = RunConfig::new(workload, cli.algo)?
        .with_pacing(cli.pacing)
        .with_seed(cli.seed);

    println!("{}", banner(&config));

    let simulation = Simulation::new(config);
    let plan = simulation.plan();
    let (short, long) = class_counts(&plan, &config.workload);
    println!(
        "\nEnqueueing {} tasks ({} short, {} long) with respect to arrival times...",
        plan.len(),
        short,
        long
    );

    let outcome = simulation.run_plan(plan)?;
    println!(
        "\nAll {} tasks completed in {:.3}s (max queue depth {})",
        outcome.tasks.len(),
        outcome.elapsed.as_secs_f64(),
        outcome.max_queue_depth
    );

    let report = outcome
        .report(&config.workload)
        .ok_or(SimError::Incomplete {
            completed: 0,
            expected: config.workload.num_tasks,
        })?;
    println!("\n{}", report);

    // The report above stands even if persisting fails
    let mut sink_error = None;
    if !cli.no_csv {
        match CsvSink::new(&cli.results_dir).persist(
            outcome.policy,
            outcome.started_at,
            &outcome.tasks,
        ) {
            Ok(path) => println!("Results exported to {}", path.display()),
            Err(e) => sink_error = Some(e),
        }
    }
    if let Some(path) = &cli.json {
        match write_json_report(path, &report) {
            Ok(()) => println!("Report written to {}", path.display()),
            Err(e) => {
                sink_error.get_or_insert(e);
            }
        }
    }

    match sink_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
