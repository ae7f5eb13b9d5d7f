use results_format::SinkError;
use thiserror::Error;
use workload::ConfigError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("generation failed at task {task_id}: {reason}")]
    Generation { task_id: u64, reason: String },

    #[error("execution failed at task {task_id}: {reason}")]
    Execution { task_id: u64, reason: String },

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{role} thread panicked")]
    Panicked { role: &'static str },

    #[error("run ended early: {completed} of {expected} tasks completed")]
    Incomplete { completed: usize, expected: usize },

    #[error("failed to persist results: {0}")]
    Sink(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, SimError>;
