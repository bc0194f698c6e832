use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::input_validation::{validate_interval, validate_path_argument};

/// Store assigned task identifier. Never reused after deletion.
pub type TaskId = i64;

/// The user editable part of a task: what to copy and how often.
///
/// Only constructible through [`TaskDefinition::new`], so a definition with an
/// empty path or a non-positive interval never exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    source_path: String,
    target_path: String,
    interval_seconds: u64,
}

impl TaskDefinition {
    pub fn new(
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        interval_seconds: i64,
    ) -> Result<Self, ValidationError> {
        let source_path = source_path.into();
        let target_path = target_path.into();

        validate_path_argument("source", &source_path)?;
        validate_path_argument("target", &target_path)?;
        let interval_seconds = validate_interval(interval_seconds)?;

        Ok(Self {
            source_path,
            target_path,
            interval_seconds,
        })
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds)
    }
}

/// One persisted row as the task store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub owner_key: String,
    pub source: String,
    pub target: String,
    /// Polling period in seconds
    pub frequency: i64,
}

impl TaskRecord {
    /// Validate the stored fields into a definition.
    pub fn definition(&self) -> Result<TaskDefinition, ValidationError> {
        TaskDefinition::new(self.source.clone(), self.target.clone(), self.frequency)
    }
}

/// A loaded task together with its runtime state, as handed to a
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_key: String,
    pub source_path: String,
    pub target_path: String,
    pub interval_seconds: u64,
    /// Not persisted. True only while an execution loop is active.
    pub running: bool,
}

impl Task {
    pub fn new(id: TaskId, owner_key: &str, definition: &TaskDefinition, running: bool) -> Self {
        Self {
            id,
            owner_key: owner_key.to_string(),
            source_path: definition.source_path().to_string(),
            target_path: definition.target_path().to_string(),
            interval_seconds: definition.interval_seconds(),
            running,
        }
    }
}
