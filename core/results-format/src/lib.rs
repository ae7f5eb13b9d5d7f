//! Results CSV Format
//!
//! One row per completed task:
//! `task_id, duration_ms, arrival_time, dequeue_time, completion_time, wait_time_ms, response_time_ms`
//!
//! Timestamps are RFC 3339 UTC with fixed nanosecond precision, so rows sort
//! lexically in time order. Wait and response times are milliseconds rounded
//! to three decimals.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use stats::AggregateReport;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use workload::{CompletedTask, PolicyKind, TaskStateError, Timestamp};

/// Column order of the results file
pub const HEADER: [&str; 7] = [
    "task_id",
    "duration_ms",
    "arrival_time",
    "dequeue_time",
    "completion_time",
    "wait_time_ms",
    "response_time_ms",
];

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task {task_id}: bad timestamp {value:?}")]
    Timestamp { task_id: u64, value: String },

    #[error("task {task_id}: {source}")]
    InvalidRow {
        task_id: u64,
        #[source]
        source: TaskStateError,
    },

    #[error("no task rows found")]
    Empty,
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// One persisted row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: u64,
    pub duration_ms: u64,
    pub arrival_time: String,
    pub dequeue_time: String,
    pub completion_time: String,
    #[serde(serialize_with = "three_decimals")]
    pub wait_time_ms: f64,
    #[serde(serialize_with = "three_decimals")]
    pub response_time_ms: f64,
}

fn three_decimals<S: serde::Serializer>(value: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(&format_args!("{:.3}", value))
}

impl TaskRecord {
    pub fn from_task(task: &CompletedTask, origin: DateTime<Utc>) -> Result<Self> {
        let stamp = |ts: Timestamp| -> Result<String> {
            ts.to_wall(origin)
                .map(format_timestamp)
                .ok_or_else(|| SinkError::Timestamp {
                    task_id: task.id,
                    value: ts.to_string(),
                })
        };

        Ok(Self {
            task_id: task.id,
            duration_ms: task.duration.as_millis() as u64,
            arrival_time: stamp(task.arrival_time)?,
            dequeue_time: stamp(task.dequeue_time)?,
            completion_time: stamp(task.completion_time)?,
            wait_time_ms: round_millis(task.wait_time()),
            response_time_ms: round_millis(task.response_time()),
        })
    }
}

fn round_millis(d: Duration) -> f64 {
    (stats::millis(d) * 1000.0).round() / 1000.0
}

/// Fixed-width, lexically sortable timestamp
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(task_id: u64, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SinkError::Timestamp {
            task_id,
            value: value.to_string(),
        })
}

/// `<policy>_results_<YYYYMMDD_HHMMSS>.csv`
pub fn results_file_name(policy: PolicyKind, at: DateTime<Local>) -> String {
    format!("{}_results_{}.csv", policy, at.format("%Y%m%d_%H%M%S"))
}

/// Write all tasks, in task-id order
pub fn write_csv<W: io::Write>(
    writer: W,
    tasks: &[CompletedTask],
    origin: DateTime<Utc>,
) -> Result<()> {
    let mut ordered: Vec<&CompletedTask> = tasks.iter().collect();
    ordered.sort_by_key(|t| t.id);

    let mut wtr = csv::Writer::from_writer(writer);
    for task in ordered {
        wtr.serialize(TaskRecord::from_task(task, origin)?)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Tasks read back from a results file
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Earliest arrival in the file; task timestamps are offsets from it
    pub origin: DateTime<Utc>,
    pub tasks: Vec<CompletedTask>,
}

pub fn read_csv<R: io::Read>(reader: R) -> Result<ResultSet> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        let record: TaskRecord = record?;
        let id = record.task_id;
        rows.push((
            record.task_id,
            Duration::from_millis(record.duration_ms),
            parse_timestamp(id, &record.arrival_time)?,
            parse_timestamp(id, &record.dequeue_time)?,
            parse_timestamp(id, &record.completion_time)?,
        ));
    }

    let origin = rows
        .iter()
        .map(|(_, _, arrival, _, _)| *arrival)
        .min()
        .ok_or(SinkError::Empty)?;

    let offset = |task_id: u64, dt: DateTime<Utc>| -> Result<Timestamp> {
        (dt - origin)
            .to_std()
            .map(Timestamp::from_offset)
            .map_err(|_| SinkError::Timestamp {
                task_id,
                value: format_timestamp(dt),
            })
    };

    let tasks = rows
        .into_iter()
        .map(|(id, duration, arrival, dequeue, completion)| {
            CompletedTask::new(
                id,
                duration,
                offset(id, arrival)?,
                offset(id, dequeue)?,
                offset(id, completion)?,
            )
            .map_err(|source| SinkError::InvalidRow { task_id: id, source })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResultSet { origin, tasks })
}

pub fn read_csv_file(path: &Path) -> Result<ResultSet> {
    read_csv(File::open(path)?)
}

/// Writes one results file per run into a directory
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a run, creating the directory if needed. Returns the file written.
    pub fn persist(
        &self,
        policy: PolicyKind,
        origin: DateTime<Utc>,
        tasks: &[CompletedTask],
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(results_file_name(policy, origin.with_timezone(&Local)));
        write_csv(File::create(&path)?, tasks, origin)?;
        Ok(path)
    }
}

/// Pretty-printed JSON copy of the aggregate report
pub fn write_json_report(path: &Path, report: &AggregateReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
