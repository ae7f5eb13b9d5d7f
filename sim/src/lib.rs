//! Head-of-Line Blocking Simulator
//!
//! One server, one queue. A paced generator thread feeds the dispatcher, a
//! single worker thread drains it under FCFS or SJF, and the caller blocks
//! until every task has completed.

pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod logging;
pub mod worker;

pub use dispatcher::{DispatchError, Dispatcher, Fcfs, SchedulingPolicy, Sjf};
pub use error::{Result, SimError};
pub use generator::{
    draw_plan, GenerationSummary, PlannedTask, ReplayWorkload, TaskGenerator, TwoPointWorkload,
    WorkloadGenerator,
};
pub use worker::Worker;

use chrono::{DateTime, Utc};
use stats::AggregateReport;
use std::fmt::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use workload::{CompletedTask, PolicyKind, RunClock, RunConfig, TaskClass, WorkloadConfig};

/// Result of one completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub policy: PolicyKind,
    /// Wall-clock time of run start; task timestamps are offsets from it
    pub started_at: DateTime<Utc>,
    /// Completed tasks in id order
    pub tasks: Vec<CompletedTask>,
    pub max_queue_depth: usize,
    pub generation: GenerationSummary,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn report(&self, config: &WorkloadConfig) -> Option<AggregateReport> {
        AggregateReport::compute(&self.tasks, config)
    }
}

/// Number of short and long tasks in a drawn plan
pub fn class_counts(plan: &[PlannedTask], config: &WorkloadConfig) -> (usize, usize) {
    plan.iter()
        .fold((0, 0), |(short, long), t| match config.classify(t.duration) {
            Some(TaskClass::Short) => (short + 1, long),
            Some(TaskClass::Long) => (short, long + 1),
            None => (short, long),
        })
}

/// Human-readable run configuration
pub fn banner(config: &RunConfig) -> String {
    let w = &config.workload;
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{}: {} Queue Scheduling",
        config.policy.as_str().to_uppercase(),
        config.policy.description()
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Configuration:");
    let _ = writeln!(out, "  Number of tasks: {}", w.num_tasks);
    let _ = writeln!(out, "  Short task duration: {:?}", w.short_task_duration());
    let _ = writeln!(out, "  Long task duration: {:?}", w.long_task_duration());
    let _ = writeln!(
        out,
        "  Short task probability: {:.0}%",
        w.short_task_probability * 100.0
    );
    let _ = writeln!(out, "  Average task duration: {:?}", w.avg_task_duration());
    let _ = writeln!(
        out,
        "  Target utilization: {:.0}%",
        w.target_utilization * 100.0
    );
    let _ = writeln!(
        out,
        "  Average inter-arrival time: {:?}",
        w.inter_arrival_interval()
    );
    let _ = writeln!(out, "  Pacing: {:?}", config.pacing);
    if let Some(seed) = config.seed {
        let _ = writeln!(out, "  Seed: {}", seed);
    }
    let _ = writeln!(out, "  Queue: single {} queue with single worker", config.policy);
    let _ = write!(out, "{}", rule);
    out
}

/// Drives one run: generator and worker threads around a shared dispatcher
pub struct Simulation {
    config: RunConfig,
}

impl Simulation {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Draw a task set from the configured distribution
    pub fn plan(&self) -> Vec<PlannedTask> {
        draw_plan(&mut TwoPointWorkload::new(
            &self.config.workload,
            self.config.seed,
        ))
    }

    /// Draw and run a fresh task set
    pub fn run(&self) -> Result<RunOutcome> {
        self.run_plan(self.plan())
    }

    /// Run a given task set to completion. Any failure aborts the whole run.
    pub fn run_plan(&self, plan: Vec<PlannedTask>) -> Result<RunOutcome> {
        self.run_with(plan, Arc::new(Dispatcher::new(self.config.policy)))
    }

    fn run_with(
        &self,
        plan: Vec<PlannedTask>,
        dispatcher: Arc<Dispatcher<PolicyKind>>,
    ) -> Result<RunOutcome> {
        let expected = plan.len();
        let policy = self.config.policy;
        let pacing = self.config.pacing;
        let (tx, rx) = crossbeam_channel::unbounded();
        let clock = RunClock::start();
        let start = Instant::now();

        tracing::info!(%policy, tasks = expected, "starting run");

        let worker = Worker::new(Arc::clone(&dispatcher), clock, tx);
        let worker_handle = thread::Builder::new()
            .name("worker".into())
            .spawn(move || worker.run())
            .map_err(|source| SimError::Spawn {
                role: "worker",
                source,
            })?;

        let generator_dispatcher = Arc::clone(&dispatcher);
        let generator_handle = thread::Builder::new()
            .name("generator".into())
            .spawn(move || {
                let mut workload = ReplayWorkload::new(plan);
                let result = TaskGenerator::new(&generator_dispatcher, clock, pacing)
                    .run(&mut workload);
                match &result {
                    Ok(_) => generator_dispatcher.close(),
                    Err(_) => {
                        generator_dispatcher.abort();
                    }
                }
                result
            });
        let generator_handle = match generator_handle {
            Ok(handle) => handle,
            Err(source) => {
                dispatcher.abort();
                let _ = worker_handle.join();
                return Err(SimError::Spawn {
                    role: "generator",
                    source,
                });
            }
        };

        // Ends early only if the worker stops and drops its sender
        let mut tasks = Vec::with_capacity(expected);
        for done in rx.iter().take(expected) {
            tasks.push(done);
            if tasks.len() % 10 == 0 {
                tracing::info!("completed {}/{} tasks", tasks.len(), expected);
            }
        }

        let worker_result = worker_handle
            .join()
            .map_err(|_| SimError::Panicked { role: "worker" })?;
        let generator_result = generator_handle
            .join()
            .map_err(|_| SimError::Panicked { role: "generator" })?;
        worker_result?;
        let generation = generator_result?;

        if tasks.len() < expected {
            return Err(SimError::Incomplete {
                completed: tasks.len(),
                expected,
            });
        }
        tasks.sort_by_key(|t| t.id);

        let outcome = RunOutcome {
            policy,
            started_at: clock.wall_origin(),
            tasks,
            max_queue_depth: dispatcher.max_depth(),
            generation,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            %policy,
            max_queue_depth = outcome.max_queue_depth,
            max_lateness_ms = outcome.generation.max_lateness.as_millis() as u64,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(outcome)
    }
}
