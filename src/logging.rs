use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::task::TaskId;

/// Number of recent copy attempts kept in memory
pub const DEFAULT_LOG_CAPACITY: usize = 5;

/// Buffered entries per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub task_id: Option<TaskId>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.message
        )
    }
}

/// Bounded, ordered record of recent copy attempts shared by every task loop.
pub struct ExecutionLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    events: broadcast::Sender<LogEntry>,
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl ExecutionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            events,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, message: &str) {
        self.append_with(LogLevel::Info, message, None);
    }

    pub fn append_with(&self, level: LogLevel, message: &str, task_id: Option<TaskId>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.trim().to_string(),
            task_id,
        };

        match level {
            LogLevel::Info => tracing::info!(task_id = ?task_id, "{}", entry.message),
            LogLevel::Error => tracing::warn!(task_id = ?task_id, "{}", entry.message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(entry.clone());

        // Remove from front if full
        while entries.len() > self.capacity {
            entries.pop_front();
        }

        // sent under the lock so subscribers observe append order
        let _ = self.events.send(entry);
    }

    /// Entries oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn task_entries(&self, task_id: TaskId) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|e| e.task_id == Some(task_id))
            .cloned()
            .collect()
    }

    /// Receive every entry appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.events.subscribe()
    }
}
