pub mod config;
pub mod error;
pub mod error_codes;
pub mod input_validation;
pub mod logging;
pub mod repository;
pub mod scheduler;
pub mod sync_engine;
pub mod system_integration;
pub mod task;


use std::sync::Arc;

pub use config::AppConfig;
pub use error::{PersistenceError, SchedulerError, ValidationError};
pub use logging::{ExecutionLog, LogEntry, LogLevel};
pub use repository::{InMemoryTaskRepository, TaskRepository, YamlTaskRepository};
pub use scheduler::Scheduler;
pub use sync_engine::{CopyExecutor, CopyOutcome, FsCopyExecutor};
pub use task::{Task, TaskDefinition, TaskId};

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Wire the YAML store, filesystem copier and execution log described by
/// `config` into a loaded scheduler.
pub async fn build_scheduler(config: &AppConfig) -> Scheduler {
    let repository = Arc::new(YamlTaskRepository::new(config.store_path.clone()));
    let executor = Arc::new(FsCopyExecutor::new(config.copy.clone()));
    let log = Arc::new(ExecutionLog::new(config.log_capacity));

    Scheduler::load(config.resolved_owner_key(), repository, executor, log).await
}
