//! Response-Time Statistics
//!
//! Summaries over a completed run: count, mean, median, min, max, p90 and
//! p99 of response and wait time, overall and per task class.
//!
//! Percentiles use the nearest-rank rule: sort ascending, take index
//! `floor(q·n)` clamped to `n−1`. No interpolation.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use workload::{CompletedTask, TaskClass, WorkloadConfig};

/// Timing view of a finished task
pub trait Sample {
    fn duration(&self) -> Duration;
    fn wait_time(&self) -> Duration;
    fn response_time(&self) -> Duration;
}

impl Sample for CompletedTask {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn wait_time(&self) -> Duration {
        CompletedTask::wait_time(self)
    }

    fn response_time(&self) -> Duration {
        CompletedTask::response_time(self)
    }
}

/// Nearest-rank percentile of an ascending slice
pub fn percentile<T: Copy>(sorted: &[T], q: f64) -> Option<T> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64) * q).floor() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

/// Median of an ascending slice; mean of the two central values for even lengths
pub fn median(sorted: &[Duration]) -> Option<Duration> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 0 {
        let lo = sorted[n / 2 - 1].as_nanos();
        let hi = sorted[n / 2].as_nanos();
        Some(nanos_to_duration((lo + hi) / 2))
    } else {
        Some(sorted[n / 2])
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    Duration::new(
        (nanos / 1_000_000_000) as u64,
        (nanos % 1_000_000_000) as u32,
    )
}

/// Milliseconds with sub-millisecond precision
pub fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(millis(*d))
}

/// Statistic set over one sample of durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub count: usize,
    #[serde(rename = "mean_ms", serialize_with = "serialize_millis")]
    pub mean: Duration,
    #[serde(rename = "median_ms", serialize_with = "serialize_millis")]
    pub median: Duration,
    #[serde(rename = "min_ms", serialize_with = "serialize_millis")]
    pub min: Duration,
    #[serde(rename = "max_ms", serialize_with = "serialize_millis")]
    pub max: Duration,
    #[serde(rename = "p90_ms", serialize_with = "serialize_millis")]
    pub p90: Duration,
    #[serde(rename = "p99_ms", serialize_with = "serialize_millis")]
    pub p99: Duration,
}

impl Summary {
    /// Sort once, then index. `None` for an empty sample.
    pub fn from_durations(mut values: Vec<Duration>) -> Option<Self> {
        values.sort_unstable();
        let n = values.len();
        let total: u128 = values.iter().map(Duration::as_nanos).sum();

        Some(Self {
            count: n,
            mean: nanos_to_duration(total.checked_div(n as u128)?),
            median: median(&values)?,
            min: *values.first()?,
            max: *values.last()?,
            p90: percentile(&values, 0.90)?,
            p99: percentile(&values, 0.99)?,
        })
    }
}

/// Response and wait summaries for one group of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub label: &'static str,
    pub response: Summary,
    pub wait: Summary,
}

impl ClassSummary {
    fn compute<S: Sample>(label: &'static str, samples: &[&S]) -> Option<Self> {
        let response = Summary::from_durations(samples.iter().map(|s| s.response_time()).collect())?;
        let wait = Summary::from_durations(samples.iter().map(|s| s.wait_time()).collect())?;
        Some(Self {
            label,
            response,
            wait,
        })
    }

    pub fn count(&self) -> usize {
        self.response.count
    }
}

/// Per-run report: all tasks, then each non-empty class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub overall: ClassSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<ClassSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<ClassSummary>,
}

impl AggregateReport {
    /// Summarize a complete result set. `None` if there are no samples.
    pub fn compute<S: Sample>(samples: &[S], config: &WorkloadConfig) -> Option<Self> {
        let all: Vec<&S> = samples.iter().collect();
        let overall = ClassSummary::compute("All", &all)?;

        let mut short = Vec::new();
        let mut long = Vec::new();
        for s in samples {
            match config.classify(s.duration()) {
                Some(TaskClass::Short) => short.push(s),
                Some(TaskClass::Long) => long.push(s),
                None => {}
            }
        }

        Some(Self {
            overall,
            short: ClassSummary::compute(TaskClass::Short.label(), &short),
            long: ClassSummary::compute(TaskClass::Long.label(), &long),
        })
    }

    pub fn class(&self, class: TaskClass) -> Option<&ClassSummary> {
        match class {
            TaskClass::Short => self.short.as_ref(),
            TaskClass::Long => self.long.as_ref(),
        }
    }

    /// Non-empty per-class summaries, short first
    pub fn classes(&self) -> impl Iterator<Item = &ClassSummary> {
        self.short.iter().chain(self.long.iter())
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary Statistics (All Tasks, n={}):", self.overall.count())?;
        write_summary(f, &self.overall)?;
        for class in self.classes() {
            writeln!(f)?;
            writeln!(
                f,
                "Summary Statistics ({} Tasks, n={}):",
                class.label,
                class.count()
            )?;
            write_summary(f, class)?;
        }
        Ok(())
    }
}

fn write_summary(f: &mut fmt::Formatter<'_>, class: &ClassSummary) -> fmt::Result {
    let r = &class.response;
    writeln!(f, "  Mean response time: {:.3} ms", millis(r.mean))?;
    writeln!(f, "  Median response time: {:.3} ms", millis(r.median))?;
    writeln!(f, "  Min response time: {:.3} ms", millis(r.min))?;
    writeln!(f, "  Max response time: {:.3} ms", millis(r.max))?;
    writeln!(f, "  P90 response time: {:.3} ms", millis(r.p90))?;
    writeln!(f, "  P99 response time: {:.3} ms", millis(r.p99))?;
    let w = &class.wait;
    writeln!(f, "  Mean wait time: {:.3} ms", millis(w.mean))?;
    writeln!(f, "  P90 wait time: {:.3} ms", millis(w.p90))?;
    writeln!(f, "  P99 wait time: {:.3} ms", millis(w.p99))
}
