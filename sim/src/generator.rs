//! Task generation and arrival pacing
//!
//! A [`WorkloadGenerator`] yields the planned task sequence (id, duration,
//! scheduled offset from run start). [`TaskGenerator`] replays that sequence
//! in real time, stamping each task on handoff to the dispatcher.

use crate::dispatcher::{Dispatcher, SchedulingPolicy};
use crate::error::{Result, SimError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use workload::{Pacing, RunClock, Task, Timestamp, WorkloadConfig};

/// One task of a drawn workload, before it arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTask {
    pub id: u64,
    pub duration: Duration,
    /// Scheduled arrival, relative to run start
    pub offset: Duration,
}

/// Workload generator
pub trait WorkloadGenerator {
    fn next_task(&mut self) -> Option<PlannedTask>;
}

/// Two-point workload: short with probability p, else long, at a fixed interval
pub struct TwoPointWorkload<R: Rng = StdRng> {
    config: WorkloadConfig,
    interval: Duration,
    next_id: u64,
    next_offset: Duration,
    rng: R,
}

impl TwoPointWorkload<StdRng> {
    /// Seeded draws are reproducible; `None` seeds from entropy
    pub fn new(config: &WorkloadConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> TwoPointWorkload<R> {
    pub fn with_rng(config: &WorkloadConfig, rng: R) -> Self {
        Self {
            config: *config,
            interval: config.inter_arrival_interval(),
            next_id: 0,
            next_offset: Duration::ZERO,
            rng,
        }
    }
}

impl<R: Rng> WorkloadGenerator for TwoPointWorkload<R> {
    fn next_task(&mut self) -> Option<PlannedTask> {
        if self.next_id >= self.config.num_tasks as u64 {
            return None;
        }

        let duration = if self.rng.gen_bool(self.config.short_task_probability) {
            self.config.short_task_duration()
        } else {
            self.config.long_task_duration()
        };

        let planned = PlannedTask {
            id: self.next_id,
            duration,
            offset: self.next_offset,
        };
        self.next_id += 1;
        self.next_offset += self.interval;
        Some(planned)
    }
}

/// Replays an already drawn task set
pub struct ReplayWorkload {
    tasks: std::vec::IntoIter<PlannedTask>,
}

impl ReplayWorkload {
    pub fn new(tasks: Vec<PlannedTask>) -> Self {
        Self {
            tasks: tasks.into_iter(),
        }
    }

    /// Ids 0.., task i scheduled at i·interval
    pub fn from_durations(interval: Duration, durations: &[Duration]) -> Self {
        let mut offset = Duration::ZERO;
        let tasks = durations
            .iter()
            .enumerate()
            .map(|(i, &duration)| {
                let planned = PlannedTask {
                    id: i as u64,
                    duration,
                    offset,
                };
                offset += interval;
                planned
            })
            .collect();
        Self::new(tasks)
    }
}

impl WorkloadGenerator for ReplayWorkload {
    fn next_task(&mut self) -> Option<PlannedTask> {
        self.tasks.next()
    }
}

/// Collect every remaining task of a generator
pub fn draw_plan<G: WorkloadGenerator>(generator: &mut G) -> Vec<PlannedTask> {
    std::iter::from_fn(|| generator.next_task()).collect()
}

/// What the pacing loop did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub generated: usize,
    /// Largest gap between a task's anchored schedule and its actual handoff
    pub max_lateness: Duration,
}

/// Real-time arrival loop feeding a dispatcher
pub struct TaskGenerator<'a, P: SchedulingPolicy> {
    dispatcher: &'a Dispatcher<P>,
    clock: RunClock,
    pacing: Pacing,
}

impl<'a, P: SchedulingPolicy> TaskGenerator<'a, P> {
    pub fn new(dispatcher: &'a Dispatcher<P>, clock: RunClock, pacing: Pacing) -> Self {
        Self {
            dispatcher,
            clock,
            pacing,
        }
    }

    /// Hand every task to the dispatcher at its scheduled time.
    /// A rejected handoff, or the dispatcher closing mid-sleep, ends generation
    /// with [`SimError::Generation`].
    pub fn run<G: WorkloadGenerator>(&self, workload: &mut G) -> Result<GenerationSummary> {
        let mut summary = GenerationSummary::default();
        let mut previous: Option<(Instant, Duration)> = None;

        while let Some(planned) = workload.next_task() {
            let anchored = self.clock.instant_at(Timestamp::from_offset(planned.offset));
            let due = match (self.pacing, previous) {
                (Pacing::Relative, Some((handoff, offset))) => {
                    handoff + planned.offset.saturating_sub(offset)
                }
                _ => anchored,
            };

            if due > Instant::now() && !self.dispatcher.sleep_until(due) {
                return Err(SimError::Generation {
                    task_id: planned.id,
                    reason: "dispatcher closed while pacing".to_string(),
                });
            }

            let arrival_time = self.clock.now();
            let handoff = Instant::now();
            let task = Task::arrived(planned.id, planned.duration, arrival_time);
            let depth = self
                .dispatcher
                .enqueue(task)
                .map_err(|e| SimError::Generation {
                    task_id: planned.id,
                    reason: e.to_string(),
                })?;

            summary.generated += 1;
            summary.max_lateness = summary
                .max_lateness
                .max(handoff.saturating_duration_since(anchored));
            previous = Some((handoff, planned.offset));

            tracing::debug!(
                task_id = planned.id,
                duration_ms = planned.duration.as_millis() as u64,
                arrival = %arrival_time,
                queue_depth = depth,
                "task arrived"
            );
            if summary.generated % 10 == 0 {
                tracing::info!("enqueued {} tasks", summary.generated);
            }
        }

        Ok(summary)
    }
}
