//! Workload Configuration
//!
//! Static parameters of a head-of-line blocking run, plus the task data
//! model shared by the generator, dispatcher, worker and result sinks.

mod task;

pub use task::{CompletedTask, RunClock, Task, TaskClass, TaskStateError, Timestamp};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Two-point workload description
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadConfig {
    pub num_tasks: usize,
    pub short_task_duration_ms: u64,
    pub long_task_duration_ms: u64,
    pub short_task_probability: f64,
    pub target_utilization: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            num_tasks: 100,
            short_task_duration_ms: 300,
            long_task_duration_ms: 2000,
            short_task_probability: 0.8,
            target_utilization: 0.7,
        }
    }
}

impl WorkloadConfig {
    pub fn short_task_duration(&self) -> Duration {
        Duration::from_millis(self.short_task_duration_ms)
    }

    pub fn long_task_duration(&self) -> Duration {
        Duration::from_millis(self.long_task_duration_ms)
    }

    /// Expected task duration: p·short + (1−p)·long
    pub fn avg_task_duration(&self) -> Duration {
        let p = self.short_task_probability;
        let short_ns = self.short_task_duration().as_nanos() as f64;
        let long_ns = self.long_task_duration().as_nanos() as f64;
        Duration::from_nanos((short_ns * p + long_ns * (1.0 - p)).round() as u64)
    }

    /// Fixed spacing between scheduled arrivals
    pub fn inter_arrival_interval(&self) -> Duration {
        let avg_ns = self.avg_task_duration().as_nanos() as f64;
        Duration::from_nanos((avg_ns / self.target_utilization).round() as u64)
    }

    /// Class of a task by exact duration match. Short wins if both durations are equal.
    pub fn classify(&self, duration: Duration) -> Option<TaskClass> {
        if duration == self.short_task_duration() {
            Some(TaskClass::Short)
        } else if duration == self.long_task_duration() {
            Some(TaskClass::Long)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_tasks == 0 {
            return Err(invalid("num_tasks", "must be positive"));
        }
        if self.short_task_duration_ms == 0 {
            return Err(invalid("short_task_duration_ms", "must be positive"));
        }
        if self.long_task_duration_ms == 0 {
            return Err(invalid("long_task_duration_ms", "must be positive"));
        }
        let p = self.short_task_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(invalid(
                "short_task_probability",
                format!("{} is outside [0, 1]", p),
            ));
        }
        let u = self.target_utilization;
        if !(u > 0.0 && u <= 1.0) {
            return Err(invalid(
                "target_utilization",
                format!("{} is outside (0, 1]", u),
            ));
        }
        Ok(())
    }

    /// Parse a `[workload]` table; absent fields keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        file.workload.validate()?;
        Ok(file.workload)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// On-disk layout of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub workload: WorkloadConfig,
}

/// Queue ordering policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Fcfs,
    Sjf,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 2] = [PolicyKind::Fcfs, PolicyKind::Sjf];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Fcfs => "fcfs",
            PolicyKind::Sjf => "sjf",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PolicyKind::Fcfs => "First-Come-First-Served",
            PolicyKind::Sjf => "Shortest-Job-First",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fcfs" => Ok(PolicyKind::Fcfs),
            "sjf" => Ok(PolicyKind::Sjf),
            other => Err(invalid(
                "policy",
                format!("unknown policy {:?} (expected fcfs or sjf)", other),
            )),
        }
    }
}

/// How the generator schedules arrivals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Task i arrives at run start + i·interval; lateness does not accumulate
    #[default]
    Anchored,
    /// Each task arrives one interval after the previous handoff
    Relative,
}

impl FromStr for Pacing {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "anchored" => Ok(Pacing::Anchored),
            "relative" => Ok(Pacing::Relative),
            other => Err(invalid(
                "pacing",
                format!("unknown pacing {:?} (expected anchored or relative)", other),
            )),
        }
    }
}

/// Everything a run needs, fixed before the first task is generated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    pub workload: WorkloadConfig,
    pub policy: PolicyKind,
    pub pacing: Pacing,
    pub seed: Option<u64>,
}

impl RunConfig {
    pub fn new(workload: WorkloadConfig, policy: PolicyKind) -> Result<Self> {
        workload.validate()?;
        Ok(Self {
            workload,
            policy,
            pacing: Pacing::default(),
            seed: None,
        })
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = WorkloadConfig::default();
        assert_eq!(cfg.num_tasks, 100);
        assert_eq!(cfg.short_task_duration(), Duration::from_millis(300));
        assert_eq!(cfg.long_task_duration(), Duration::from_millis(2000));
        assert_eq!(cfg.avg_task_duration(), Duration::from_millis(640));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_inter_arrival_interval() {
        let cfg = WorkloadConfig {
            num_tasks: 10,
            short_task_duration_ms: 100,
            long_task_duration_ms: 1000,
            short_task_probability: 1.0,
            target_utilization: 1.0,
        };
        assert_eq!(cfg.inter_arrival_interval(), Duration::from_millis(100));

        let default = WorkloadConfig::default();
        // 640ms / 0.7
        assert_eq!(default.inter_arrival_interval(), Duration::from_nanos(914_285_714));
    }

    #[test]
    fn test_validation() {
        let base = WorkloadConfig::default();

        let zero_tasks = WorkloadConfig { num_tasks: 0, ..base };
        assert!(matches!(
            zero_tasks.validate(),
            Err(ConfigError::Invalid { field: "num_tasks", .. })
        ));

        for u in [0.0, -0.5, 1.5, f64::NAN] {
            let cfg = WorkloadConfig { target_utilization: u, ..base };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::Invalid { field: "target_utilization", .. })
            ));
        }

        for p in [-0.1, 1.1, f64::NAN] {
            let cfg = WorkloadConfig { short_task_probability: p, ..base };
            assert!(cfg.validate().is_err());
        }

        let all_long = WorkloadConfig { short_task_probability: 0.0, ..base };
        assert!(all_long.validate().is_ok());

        let no_short = WorkloadConfig { short_task_duration_ms: 0, ..base };
        assert!(no_short.validate().is_err());
    }

    #[test]
    fn test_classify() {
        let cfg = WorkloadConfig::default();
        assert_eq!(cfg.classify(Duration::from_millis(300)), Some(TaskClass::Short));
        assert_eq!(cfg.classify(Duration::from_millis(2000)), Some(TaskClass::Long));
        assert_eq!(cfg.classify(Duration::from_millis(301)), None);

        let same = WorkloadConfig {
            long_task_duration_ms: 300,
            ..cfg
        };
        assert_eq!(same.classify(Duration::from_millis(300)), Some(TaskClass::Short));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = WorkloadConfig::from_toml_str(
            "[workload]\nnum_tasks = 20\nshort_task_probability = 0.5\n",
        )
        .unwrap();
        assert_eq!(cfg.num_tasks, 20);
        assert_eq!(cfg.short_task_probability, 0.5);
        assert_eq!(cfg.long_task_duration_ms, 2000);
        assert_eq!(cfg.target_utilization, 0.7);
    }

    #[test]
    fn test_toml_errors() {
        assert!(matches!(
            WorkloadConfig::from_toml_str("[workload]\nnum_taks = 3\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            WorkloadConfig::from_toml_str("[workload]\ntarget_utilization = 0.0\n"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = WorkloadConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, WorkloadConfig::default());
    }

    #[test]
    fn test_load_unreachable_file_is_an_error() {
        // a regular file used as a directory: stat fails, but not with NotFound
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("config.toml");
        assert!(!path.exists());
        match WorkloadConfig::load(&path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workload]\nlong_task_duration_ms = 1500").unwrap();
        let cfg = WorkloadConfig::load(file.path()).unwrap();
        assert_eq!(cfg.long_task_duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("fcfs".parse::<PolicyKind>().unwrap(), PolicyKind::Fcfs);
        assert_eq!("sjf".parse::<PolicyKind>().unwrap(), PolicyKind::Sjf);
        assert!("lifo".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::Sjf.to_string(), "sjf");
        assert_eq!("relative".parse::<Pacing>().unwrap(), Pacing::Relative);
    }

    #[test]
    fn test_run_config_validates() {
        let bad = WorkloadConfig {
            target_utilization: 0.0,
            ..WorkloadConfig::default()
        };
        assert!(RunConfig::new(bad, PolicyKind::Fcfs).is_err());

        let run = RunConfig::new(WorkloadConfig::default(), PolicyKind::Sjf)
            .unwrap()
            .with_seed(Some(7));
        assert_eq!(run.policy, PolicyKind::Sjf);
        assert_eq!(run.pacing, Pacing::Anchored);
        assert_eq!(run.seed, Some(7));
    }
}
