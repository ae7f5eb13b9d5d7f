//! Task data model
//!
//! Timestamps are offsets from the run's monotonic origin. The wall-clock
//! origin travels alongside in [`RunClock`] and is only used for rendering.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Instant within a run, as an offset from the run's origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_offset(offset: Duration) -> Self {
        Self(offset)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn offset(&self) -> Duration {
        self.0
    }

    /// Elapsed time since `earlier`, zero if `earlier` is later
    pub fn since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Wall-clock time of this instant given the run's wall-clock origin
    pub fn to_wall(&self, origin: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let delta = TimeDelta::from_std(self.0).ok()?;
        origin.checked_add_signed(delta)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:.3}ms", self.0.as_secs_f64() * 1000.0)
    }
}

/// Clock shared by every activity of a run
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Utc::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed())
    }

    /// Monotonic instant corresponding to `ts`
    pub fn instant_at(&self, ts: Timestamp) -> Instant {
        self.origin + ts.0
    }

    pub fn wall_origin(&self) -> DateTime<Utc> {
        self.wall_origin
    }
}

/// Duration class of the two-point workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
    Short,
    Long,
}

impl TaskClass {
    pub fn label(&self) -> &'static str {
        match self {
            TaskClass::Short => "Short",
            TaskClass::Long => "Long",
        }
    }
}

/// Violations of the task lifecycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskStateError {
    #[error("task {task_id} was already dequeued at {at}")]
    AlreadyDequeued { task_id: u64, at: Timestamp },

    #[error("task {task_id} dequeued at {dequeued} before its arrival at {arrived}")]
    DequeuedBeforeArrival {
        task_id: u64,
        arrived: Timestamp,
        dequeued: Timestamp,
    },

    #[error("task {task_id} completed without being dequeued")]
    NotDequeued { task_id: u64 },

    #[error("task {task_id} completed at {completed} before its dequeue at {dequeued}")]
    CompletedBeforeDequeue {
        task_id: u64,
        dequeued: Timestamp,
        completed: Timestamp,
    },
}

/// A task that has arrived and may be waiting or running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub duration: Duration,
    pub arrival_time: Timestamp,
    dequeue_time: Option<Timestamp>,
}

impl Task {
    pub fn arrived(id: u64, duration: Duration, arrival_time: Timestamp) -> Self {
        Self {
            id,
            duration,
            arrival_time,
            dequeue_time: None,
        }
    }

    pub fn dequeue_time(&self) -> Option<Timestamp> {
        self.dequeue_time
    }

    /// Stamp the start of processing. Allowed exactly once.
    pub fn mark_dequeued(&mut self, at: Timestamp) -> Result<(), TaskStateError> {
        if let Some(prev) = self.dequeue_time {
            return Err(TaskStateError::AlreadyDequeued {
                task_id: self.id,
                at: prev,
            });
        }
        if at < self.arrival_time {
            return Err(TaskStateError::DequeuedBeforeArrival {
                task_id: self.id,
                arrived: self.arrival_time,
                dequeued: at,
            });
        }
        self.dequeue_time = Some(at);
        Ok(())
    }

    /// Stamp the end of processing, consuming the in-flight task
    pub fn complete(self, at: Timestamp) -> Result<CompletedTask, TaskStateError> {
        let dequeue_time = self
            .dequeue_time
            .ok_or(TaskStateError::NotDequeued { task_id: self.id })?;
        CompletedTask::new(self.id, self.duration, self.arrival_time, dequeue_time, at)
    }
}

/// A task with all three timestamps set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTask {
    pub id: u64,
    pub duration: Duration,
    pub arrival_time: Timestamp,
    pub dequeue_time: Timestamp,
    pub completion_time: Timestamp,
}

impl CompletedTask {
    pub fn new(
        id: u64,
        duration: Duration,
        arrival_time: Timestamp,
        dequeue_time: Timestamp,
        completion_time: Timestamp,
    ) -> Result<Self, TaskStateError> {
        if dequeue_time < arrival_time {
            return Err(TaskStateError::DequeuedBeforeArrival {
                task_id: id,
                arrived: arrival_time,
                dequeued: dequeue_time,
            });
        }
        if completion_time < dequeue_time {
            return Err(TaskStateError::CompletedBeforeDequeue {
                task_id: id,
                dequeued: dequeue_time,
                completed: completion_time,
            });
        }
        Ok(Self {
            id,
            duration,
            arrival_time,
            dequeue_time,
            completion_time,
        })
    }

    /// Time spent queued
    pub fn wait_time(&self) -> Duration {
        self.dequeue_time.since(self.arrival_time)
    }

    /// Total time in the system
    pub fn response_time(&self) -> Duration {
        self.completion_time.since(self.arrival_time)
    }

    /// Observed processing time
    pub fn service_time(&self) -> Duration {
        self.completion_time.since(self.dequeue_time)
    }
}
