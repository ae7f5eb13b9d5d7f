//! Dispatcher: the shared queue between arrivals and the worker
//!
//! A monitor over a priority heap. `enqueue` and `select_next` each take the
//! lock for a single insertion or removal; the worker waits on a condition
//! variable while the queue is empty, so nothing busy-polls and no lock is
//! held across pacing or simulated work.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use thiserror::Error;
use workload::{PolicyKind, Task};

/// Ordering policy over queued tasks
pub trait SchedulingPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Primary rank; lower runs first. Equal ranks run in arrival order.
    fn rank(&self, task: &Task) -> Duration;
}

/// First-Come-First-Served: every task has the same rank
#[derive(Debug, Clone, Copy, Default)]
pub struct Fcfs;

impl SchedulingPolicy for Fcfs {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn rank(&self, _task: &Task) -> Duration {
        Duration::ZERO
    }
}

/// Shortest-Job-First on the task's assigned duration
#[derive(Debug, Clone, Copy, Default)]
pub struct Sjf;

impl SchedulingPolicy for Sjf {
    fn name(&self) -> &'static str {
        "sjf"
    }

    fn rank(&self, task: &Task) -> Duration {
        task.duration
    }
}

impl SchedulingPolicy for PolicyKind {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn rank(&self, task: &Task) -> Duration {
        match self {
            PolicyKind::Fcfs => Fcfs.rank(task),
            PolicyKind::Sjf => Sjf.rank(task),
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The rejected task is handed back
    #[error("dispatcher is closed")]
    Closed(Task),
}

#[derive(Debug)]
struct Queued {
    rank: Duration,
    seq: u64,
    task: Task,
}

impl Ord for Queued {
    // BinaryHeap pops the greatest; reverse so the lowest (rank, seq) wins
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for Queued {}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    closed: bool,
    max_depth: usize,
}

/// Arrived-but-not-started tasks, ordered by `P`
pub struct Dispatcher<P: SchedulingPolicy> {
    policy: P,
    state: Mutex<QueueState>,
    available: Condvar,
    // wakes pacing sleeps on close or abort
    closing: Condvar,
}

impl<P: SchedulingPolicy> Dispatcher<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            closing: Condvar::new(),
        }
    }

    /// Insert an arrived task. Returns the queue depth after insertion.
    pub fn enqueue(&self, task: Task) -> Result<usize, DispatchError> {
        let rank = self.policy.rank(&task);
        let mut state = self.state.lock();
        if state.closed {
            return Err(DispatchError::Closed(task));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Queued { rank, seq, task });
        let depth = state.heap.len();
        state.max_depth = state.max_depth.max(depth);
        drop(state);

        self.available.notify_one();
        Ok(depth)
    }

    /// Remove the highest-priority task, waiting while the queue is empty.
    /// Returns `None` once the dispatcher is closed and drained.
    pub fn select_next(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(queued) = state.heap.pop() {
                return Some(queued.task);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    pub fn try_select_next(&self) -> Option<Task> {
        self.state.lock().heap.pop().map(|q| q.task)
    }

    /// Refuse further arrivals; queued tasks are still handed out
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
        self.closing.notify_all();
    }

    /// Refuse further arrivals and discard queued tasks. Returns the number discarded.
    pub fn abort(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let discarded = state.heap.len();
        state.heap.clear();
        drop(state);

        self.available.notify_all();
        self.closing.notify_all();
        discarded
    }

    /// Block until `deadline` without holding the lock. Returns `false` if the
    /// dispatcher is closed first.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while !state.closed {
            if self.closing.wait_until(&mut state, deadline).timed_out() {
                return !state.closed;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Highest queue depth seen so far
    pub fn max_depth(&self) -> usize {
        self.state.lock().max_depth
    }
}
