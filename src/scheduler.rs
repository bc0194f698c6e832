//! Task scheduler
//!
//! Owns the loaded task set and one execution loop per running task. Each loop
//! copies, logs, then sleeps for its interval; a stop is delivered through the
//! task's cancellation token and observed at the next sleep.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{PersistenceError, SchedulerError};
use crate::logging::{ExecutionLog, LogEntry, LogLevel};
use crate::repository::TaskRepository;
use crate::sync_engine::{CopyExecutor, CopyOutcome};
use crate::task::{Task, TaskDefinition, TaskId};

/// Definition shared between the registry and a live loop. Loops re-read it on
/// every iteration, so an edit applies from the next copy onwards.
type SharedDefinition = Arc<StdRwLock<TaskDefinition>>;

struct RunHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunHandle {
    fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

struct TaskSlot {
    definition: SharedDefinition,
    run: Option<RunHandle>,
}

impl TaskSlot {
    fn new(definition: TaskDefinition) -> Self {
        Self {
            definition: Arc::new(StdRwLock::new(definition)),
            run: None,
        }
    }

    fn definition(&self) -> TaskDefinition {
        self.definition
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn retarget(&self, definition: TaskDefinition) {
        let mut current = self.definition.write().unwrap_or_else(|e| e.into_inner());
        *current = definition;
    }

    fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(RunHandle::is_active)
    }

    /// Spawn a loop unless one is already active. Returns whether it started.
    fn start(&mut self, id: TaskId, executor: Arc<dyn CopyExecutor>, log: Arc<ExecutionLog>) -> bool {
        if self.is_running() {
            return false;
        }

        // a stopped loop may still be finishing a copy; the new one waits for it
        let previous = self.run.take().map(|run| run.handle);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_task_loop(
            id,
            Arc::clone(&self.definition),
            executor,
            log,
            token.clone(),
            previous,
        ));

        self.run = Some(RunHandle { token, handle });
        true
    }

    /// Signal the loop to exit. Returns whether it was running.
    fn stop(&self) -> bool {
        let was_running = self.is_running();
        if let Some(run) = &self.run {
            run.token.cancel();
        }
        was_running
    }
}

async fn run_task_loop(
    id: TaskId,
    definition: SharedDefinition,
    executor: Arc<dyn CopyExecutor>,
    log: Arc<ExecutionLog>,
    token: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    tracing::debug!(task_id = id, "execution loop started");

    while !token.is_cancelled() {
        let current = definition
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let outcome = execute_copy(&executor, &current).await;
        let level = if outcome.ok {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        log.append_with(level, &attempt_message(&current, &outcome), Some(id));

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(current.interval()) => {}
        }
    }

    tracing::debug!(task_id = id, "execution loop stopped");
}

/// Run one copy on the blocking pool. A panicking executor counts as a failed copy.
async fn execute_copy(executor: &Arc<dyn CopyExecutor>, definition: &TaskDefinition) -> CopyOutcome {
    let executor = Arc::clone(executor);
    let source = definition.source_path().to_string();
    let target = definition.target_path().to_string();

    match tokio::task::spawn_blocking(move || executor.copy(&source, &target)).await {
        Ok(outcome) => outcome,
        Err(e) => CopyOutcome::failure(format!("copy aborted: {e}")),
    }
}

fn attempt_message(definition: &TaskDefinition, outcome: &CopyOutcome) -> String {
    let output = outcome.output.trim();
    let header = format!(
        "Sync: {} -> {}",
        definition.source_path(),
        definition.target_path()
    );
    if output.is_empty() {
        header
    } else {
        format!("{header}\n{output}")
    }
}

pub struct Scheduler {
    owner_key: String,
    repository: Arc<dyn TaskRepository>,
    executor: Arc<dyn CopyExecutor>,
    log: Arc<ExecutionLog>,
    tasks: RwLock<HashMap<TaskId, TaskSlot>>,
}

impl Scheduler {
    /// Scheduler with an empty task set. See [`Scheduler::load`].
    pub fn new(
        owner_key: impl Into<String>,
        repository: Arc<dyn TaskRepository>,
        executor: Arc<dyn CopyExecutor>,
        log: Arc<ExecutionLog>,
    ) -> Self {
        Self {
            owner_key: owner_key.into(),
            repository,
            executor,
            log,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Build a scheduler and load the owner's tasks. An unreachable store
    /// yields an empty task set instead of an error.
    pub async fn load(
        owner_key: impl Into<String>,
        repository: Arc<dyn TaskRepository>,
        executor: Arc<dyn CopyExecutor>,
        log: Arc<ExecutionLog>,
    ) -> Self {
        let scheduler = Self::new(owner_key, repository, executor, log);
        match scheduler.reload().await {
            Ok(count) => tracing::info!(owner_key = %scheduler.owner_key, count, "loaded tasks"),
            Err(e) => {
                tracing::error!(error = %e, "failed to load tasks, starting with none");
                scheduler
                    .log
                    .append_with(LogLevel::Error, &format!("Failed to load tasks: {e}"), None);
            }
        }
        scheduler
    }

    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub fn log(&self) -> &Arc<ExecutionLog> {
        &self.log
    }

    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.log.snapshot()
    }

    /// Rebuild the task set from the store.
    ///
    /// Loops of tasks that still exist keep running against the reloaded
    /// definition; loops of tasks that disappeared are stopped. New tasks
    /// start idle.
    pub async fn reload(&self) -> Result<usize, PersistenceError> {
        let records = self.repository.list(&self.owner_key)?;

        let mut fresh = HashMap::with_capacity(records.len());
        for record in records {
            match record.definition() {
                Ok(definition) => {
                    fresh.insert(record.id, definition);
                }
                Err(e) => tracing::warn!(task_id = record.id, error = %e, "skipping invalid task record"),
            }
        }

        let mut tasks = self.tasks.write().await;
        tasks.retain(|id, slot| {
            if fresh.contains_key(id) {
                true
            } else {
                slot.stop();
                false
            }
        });

        for (id, definition) in fresh {
            match tasks.entry(id) {
                Entry::Occupied(slot) => slot.get().retarget(definition),
                Entry::Vacant(slot) => {
                    slot.insert(TaskSlot::new(definition));
                }
            }
        }

        Ok(tasks.len())
    }

    /// Loaded tasks of this scheduler's owner, ordered by id.
    pub async fn tasks(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut list: Vec<Task> = tasks
            .iter()
            .map(|(id, slot)| Task::new(*id, &self.owner_key, &slot.definition(), slot.is_running()))
            .collect();
        list.sort_by_key(|t| t.id);
        list
    }

    /// Tasks of `owner_key`. Other owners are read straight from the store and
    /// are never running here.
    pub async fn list_tasks(&self, owner_key: &str) -> Result<Vec<Task>, SchedulerError> {
        if owner_key == self.owner_key {
            return Ok(self.tasks().await);
        }

        let records = self.repository.list(owner_key)?;
        Ok(records
            .iter()
            .filter_map(|r| {
                r.definition()
                    .ok()
                    .map(|d| Task::new(r.id, &r.owner_key, &d, false))
            })
            .collect())
    }

    pub async fn add_task(&self, source: &str, target: &str, interval_seconds: i64) -> Result<TaskId, SchedulerError> {
        let definition = TaskDefinition::new(source, target, interval_seconds)?;
        let id = self.repository.create(&self.owner_key, &definition)?;

        self.tasks
            .write()
            .await
            .insert(id, TaskSlot::new(definition));
        tracing::info!(task_id = id, source, target, interval_seconds, "task added");

        self.reload_after_write().await;
        Ok(id)
    }

    /// Persist a new definition. A running loop picks it up from its next
    /// iteration.
    pub async fn edit_task(
        &self,
        id: TaskId,
        source: &str,
        target: &str,
        interval_seconds: i64,
    ) -> Result<(), SchedulerError> {
        let definition = TaskDefinition::new(source, target, interval_seconds)?;
        self.ensure_owned(id).await?;
        self.repository.update(id, &definition)?;

        if let Some(slot) = self.tasks.read().await.get(&id) {
            slot.retarget(definition);
        }
        tracing::info!(task_id = id, source, target, interval_seconds, "task edited");

        self.reload_after_write().await;
        Ok(())
    }

    /// Remove a task. A loop in the middle of a copy finishes that copy and
    /// then exits. Stored rows that were skipped on load can be removed too.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.ensure_owned(id).await?;
        self.repository.delete(id)?;

        if let Some(slot) = self.tasks.write().await.remove(&id) {
            slot.stop();
        }
        tracing::info!(task_id = id, "task deleted");

        self.reload_after_write().await;
        Ok(())
    }

    /// Start a loop for every idle task. Returns how many were started.
    pub async fn start_all(&self) -> usize {
        let mut tasks = self.tasks.write().await;
        let mut started = 0;
        for (id, slot) in tasks.iter_mut() {
            if slot.start(*id, Arc::clone(&self.executor), Arc::clone(&self.log)) {
                started += 1;
            }
        }
        tracing::info!(started, total = tasks.len(), "start all");
        started
    }

    /// Signal every loop to exit. Returns how many were running.
    pub async fn stop_all(&self) -> usize {
        let tasks = self.tasks.read().await;
        let stopped = tasks.values().filter(|slot| slot.stop()).count();
        tracing::info!(stopped, "stop all");
        stopped
    }

    pub async fn start_task(&self, id: TaskId) -> Result<bool, SchedulerError> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks.get_mut(&id).ok_or(SchedulerError::UnknownTask(id))?;
        Ok(slot.start(id, Arc::clone(&self.executor), Arc::clone(&self.log)))
    }

    pub async fn stop_task(&self, id: TaskId) -> Result<bool, SchedulerError> {
        let tasks = self.tasks.read().await;
        let slot = tasks.get(&id).ok_or(SchedulerError::UnknownTask(id))?;
        Ok(slot.stop())
    }

    pub async fn is_running(&self, id: TaskId) -> bool {
        self.tasks
            .read()
            .await
            .get(&id)
            .is_some_and(TaskSlot::is_running)
    }

    /// Stop every loop and wait until in-flight copies have finished.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.write().await;
            tasks
                .values_mut()
                .filter_map(|slot| {
                    slot.stop();
                    slot.run.take().map(|run| run.handle)
                })
                .collect()
        };

        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("scheduler shut down");
    }

    /// [`Scheduler::shutdown`] bounded by `grace`. Returns false when a copy
    /// was still running at the deadline; its loop is abandoned.
    pub async fn shutdown_within(&self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.shutdown()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(?grace, "copies still in flight at shutdown, abandoning them");
                false
            }
        }
    }

    /// The id is loaded, or stored for this owner but skipped as invalid.
    async fn ensure_owned(&self, id: TaskId) -> Result<(), SchedulerError> {
        if self.tasks.read().await.contains_key(&id) {
            return Ok(());
        }

        let stored = self.repository.list(&self.owner_key)?;
        if stored.iter().any(|record| record.id == id) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownTask(id))
        }
    }

    /// The store write already succeeded; a failed reload only leaves memory
    /// behind the store until the next load.
    async fn reload_after_write(&self) {
        if let Err(e) = self.reload().await {
            tracing::warn!(error = %e, "reload after write failed");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for slot in self.tasks.get_mut().values() {
            slot.stop();
        }
    }
}
