//! Inspect a results CSV
//!
//! Reads the rows back and prints the same aggregate report a run prints.

use clap::Parser;
use results_format::{format_timestamp, read_csv_file};
use stats::AggregateReport;
use std::path::PathBuf;
use workload::{WorkloadConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "inspect", about = "Summarize a results CSV")]
struct Args {
    /// Results file written by a run
    csv: PathBuf,

    /// Config whose short/long durations define the task classes
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() {
    let args = Args::parse();

    let config = match WorkloadConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loading {}...", args.csv.display());
    let set = match read_csv_file(&args.csv) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("error: {}: {}", args.csv.display(), e);
            std::process::exit(1);
        }
    };

    println!("Tasks: {}", set.tasks.len());
    println!("First arrival: {}", format_timestamp(set.origin));
    println!(
        "Classes: short = {} ms, long = {} ms\n",
        config.short_task_duration_ms, config.long_task_duration_ms
    );

    match AggregateReport::compute(&set.tasks, &config) {
        Some(report) => print!("{}", report),
        None => println!("No tasks to summarize"),
    }
}
