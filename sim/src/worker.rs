//! Single-server executor
//!
//! Pulls one task at a time from the dispatcher and holds it for exactly its
//! assigned duration. The queue lock is never held while a task runs.

use crate::dispatcher::{Dispatcher, SchedulingPolicy};
use crate::error::{Result, SimError};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread;
use workload::{CompletedTask, RunClock, Task};

pub struct Worker<P: SchedulingPolicy> {
    dispatcher: Arc<Dispatcher<P>>,
    clock: RunClock,
    completions: Sender<CompletedTask>,
}

impl<P: SchedulingPolicy> Worker<P> {
    pub fn new(
        dispatcher: Arc<Dispatcher<P>>,
        clock: RunClock,
        completions: Sender<CompletedTask>,
    ) -> Self {
        Self {
            dispatcher,
            clock,
            completions,
        }
    }

    /// Serve until the dispatcher is closed and drained. Returns the number of
    /// tasks completed. On failure the dispatcher is aborted so arrivals stop.
    pub fn run(self) -> Result<usize> {
        let mut completed = 0;
        while let Some(task) = self.dispatcher.select_next() {
            let outcome = self.process(task).and_then(|done| self.emit(done));
            if let Err(e) = outcome {
                let discarded = self.dispatcher.abort();
                tracing::error!(error = %e, discarded, "worker stopped");
                return Err(e);
            }
            completed += 1;
        }
        tracing::debug!(completed, "worker drained");
        Ok(completed)
    }

    /// Stamp dequeue, simulate the work, stamp completion
    pub fn process(&self, mut task: Task) -> Result<CompletedTask> {
        let task_id = task.id;
        let execution = |e: workload::TaskStateError| SimError::Execution {
            task_id,
            reason: e.to_string(),
        };

        task.mark_dequeued(self.clock.now()).map_err(execution)?;
        tracing::trace!(task_id, duration_ms = task.duration.as_millis() as u64, "task started");

        thread::sleep(task.duration);

        let done = task.complete(self.clock.now()).map_err(execution)?;
        tracing::debug!(
            task_id,
            wait_ms = done.wait_time().as_millis() as u64,
            response_ms = done.response_time().as_millis() as u64,
            "task completed"
        );
        Ok(done)
    }

    fn emit(&self, done: CompletedTask) -> Result<()> {
        let task_id = done.id;
        self.completions
            .send(done)
            .map_err(|_| SimError::Execution {
                task_id,
                reason: "result channel closed".to_string(),
            })
    }
}
