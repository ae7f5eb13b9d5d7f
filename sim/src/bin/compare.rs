//! Policy comparison
//!
//! Draws one task set and runs it under every policy, so each sees identical
//! durations and the same arrival schedule. Prints per-class response times
//! side by side.

use clap::Parser;
use sim::{class_counts, logging, Simulation};
use stats::{millis, AggregateReport};
use std::path::PathBuf;
use workload::{Pacing, PolicyKind, RunConfig, TaskClass, WorkloadConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "compare", about = "Run one workload under FCFS and SJF")]
struct Args {
    /// Workload config file (defaults apply when missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

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
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> sim::Result<()> {
    let workload = WorkloadConfig::load(&args.config)?;
    let base = RunConfig::new(workload, PolicyKind::Fcfs)?
        .with_pacing(args.pacing)
        .with_seed(args.seed);

    let plan = Simulation::new(base).plan();
    let (short, long) = class_counts(&plan, &workload);
    println!("=== Policy Comparison ===");
    println!(
        "Workload: {} tasks ({} short @ {} ms, {} long @ {} ms), inter-arrival {:?}\n",
        plan.len(),
        short,
        workload.short_task_duration_ms,
        long,
        workload.long_task_duration_ms,
        workload.inter_arrival_interval()
    );

    let mut results: Vec<(PolicyKind, AggregateReport)> = Vec::new();
    for policy in PolicyKind::ALL {
        println!("Running {} ({})...", policy, policy.description());
        let outcome = Simulation::new(base.with_policy(policy)).run_plan(plan.clone())?;
        if let Some(report) = outcome.report(&workload) {
            results.push((policy, report));
        }
    }

    println!(
        "\n{:<8} {:<6} {:>6} {:>12} {:>12} {:>12} {:>12}",
        "Policy", "Class", "n", "mean (ms)", "p50 (ms)", "p90 (ms)", "p99 (ms)"
    );
    println!("{:-<74}", "");
    for (policy, report) in &results {
        let rows = std::iter::once(&report.overall).chain(report.classes());
        for class in rows {
            let r = &class.response;
            println!(
                "{:<8} {:<6} {:>6} {:>12.1} {:>12.1} {:>12.1} {:>12.1}",
                policy.as_str(),
                class.label,
                r.count,
                millis(r.mean),
                millis(r.median),
                millis(r.p90),
                millis(r.p99)
            );
        }
    }

    if let [(_, fcfs), (_, sjf)] = results.as_slice() {
        println!("\n=== Head-of-Line Effect ===");
        for class in [TaskClass::Short, TaskClass::Long] {
            if let (Some(a), Some(b)) = (fcfs.class(class), sjf.class(class)) {
                println!(
                    "{} tasks: mean response {:.1} ms (fcfs) -> {:.1} ms (sjf)",
                    class.label(),
                    millis(a.response.mean),
                    millis(b.response.mean)
                );
            }
        }
    }

    Ok(())
}
