use std::path::PathBuf;

use thiserror::Error;

use crate::error_codes::{ERR_PERSISTENCE, ERR_UNKNOWN_TASK, ERR_VALIDATION};
use crate::task::TaskId;

/// Rejected task input. Raised before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("interval must be a positive number of seconds, got {0}")]
    NonPositiveInterval(i64),

    #[error("{0} path cannot be empty")]
    EmptyPath(&'static str),

    #[error("{field} path too long: {len} bytes (max: {max})")]
    PathTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{0} path contains a null byte")]
    NullByte(&'static str),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to {op} task store {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task store is malformed: {0}")]
    Format(#[from] serde_yaml::Error),

    #[error("task {0} does not exist in the store")]
    NotFound(TaskId),

    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("task store has no task ids left")]
    IdsExhausted,
}

/// Errors surfaced to callers of the scheduler's task operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("task {0} is not loaded")]
    UnknownTask(TaskId),
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Validation(_) => ERR_VALIDATION,
            SchedulerError::Persistence(_) => ERR_PERSISTENCE,
            SchedulerError::UnknownTask(_) => ERR_UNKNOWN_TASK,
        }
    }
}
