//! Task store
//!
//! Durable task rows keyed by id and scoped by owner key. The scheduler only
//! talks to [`TaskRepository`]; the YAML file store is the default backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::task::{TaskDefinition, TaskId, TaskRecord};

pub trait TaskRepository: Send + Sync {
    /// Persist a new task and return its freshly assigned id.
    fn create(&self, owner_key: &str, definition: &TaskDefinition) -> Result<TaskId, PersistenceError>;

    /// All rows created by `owner_key`, in store order.
    fn list(&self, owner_key: &str) -> Result<Vec<TaskRecord>, PersistenceError>;

    fn update(&self, id: TaskId, definition: &TaskDefinition) -> Result<(), PersistenceError>;

    fn delete(&self, id: TaskId) -> Result<(), PersistenceError>;
}

/// On-disk document layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
struct TaskStore {
    next_id: TaskId,
    tasks: Vec<TaskRecord>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self {
            next_id: 1,
            tasks: Vec::new(),
        }
    }
}

impl TaskStore {
    fn create(&mut self, owner_key: &str, definition: &TaskDefinition) -> Result<TaskId, PersistenceError> {
        // next_id only moves forward, also past ids seen in hand-edited files
        let max_seen = self.tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let after_seen = max_seen.checked_add(1).ok_or(PersistenceError::IdsExhausted)?;
        let id = self.next_id.max(after_seen);
        self.next_id = id.saturating_add(1);

        self.tasks.push(TaskRecord {
            id,
            owner_key: owner_key.to_string(),
            source: definition.source_path().to_string(),
            target: definition.target_path().to_string(),
            frequency: definition.interval_seconds() as i64,
        });
        Ok(id)
    }

    fn list(&self, owner_key: &str) -> Vec<TaskRecord> {
        self.tasks
            .iter()
            .filter(|t| t.owner_key == owner_key)
            .cloned()
            .collect()
    }

    fn update(&mut self, id: TaskId, definition: &TaskDefinition) -> Result<(), PersistenceError> {
        let record = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(PersistenceError::NotFound(id))?;

        record.source = definition.source_path().to_string();
        record.target = definition.target_path().to_string();
        record.frequency = definition.interval_seconds() as i64;
        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> Result<(), PersistenceError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Err(PersistenceError::NotFound(id));
        }
        Ok(())
    }
}

/// Task store kept in a single YAML file.
///
/// Every operation reads the file, applies the change and rewrites it
/// atomically. A missing file is an empty store.
pub struct YamlTaskRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl YamlTaskRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_store(&self) -> Result<TaskStore, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TaskStore::default()),
            Err(source) => {
                return Err(PersistenceError::Io {
                    op: "read",
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(TaskStore::default());
        }

        Ok(serde_yaml::from_str(&content)?)
    }

    fn write_store(&self, store: &TaskStore) -> Result<(), PersistenceError> {
        let io_err = |op: &'static str| {
            let path = self.path.clone();
            move |source: std::io::Error| PersistenceError::Io { op, path, source }
        };

        let content = serde_yaml::to_string(store)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err("create directory for"))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err("stage"))?;
        tmp.write_all(content.as_bytes()).map_err(io_err("write"))?;
        tmp.as_file().sync_all().map_err(io_err("flush"))?;
        tmp.persist(&self.path).map_err(|e| io_err("replace")(e.error))?;
        Ok(())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut TaskStore) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut store = self.read_store()?;
        let value = f(&mut store)?;
        self.write_store(&store)?;
        Ok(value)
    }
}

impl TaskRepository for YamlTaskRepository {
    fn create(&self, owner_key: &str, definition: &TaskDefinition) -> Result<TaskId, PersistenceError> {
        self.modify(|store| store.create(owner_key, definition))
    }

    fn list(&self, owner_key: &str) -> Result<Vec<TaskRecord>, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_store()?.list(owner_key))
    }

    fn update(&self, id: TaskId, definition: &TaskDefinition) -> Result<(), PersistenceError> {
        self.modify(|store| store.update(id, definition))
    }

    fn delete(&self, id: TaskId) -> Result<(), PersistenceError> {
        self.modify(|store| store.delete(id))
    }
}

/// Task store that lives only as long as the process.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    store: Mutex<TaskStore>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw row, bypassing validation. Useful for simulating stores
    /// written by other tools.
    pub fn insert_raw(&self, record: TaskRecord) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.next_id = store.next_id.max(record.id.saturating_add(1));
        store.tasks.push(record);
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn create(&self, owner_key: &str, definition: &TaskDefinition) -> Result<TaskId, PersistenceError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.create(owner_key, definition)
    }

    fn list(&self, owner_key: &str) -> Result<Vec<TaskRecord>, PersistenceError> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        Ok(store.list(owner_key))
    }

    fn update(&self, id: TaskId, definition: &TaskDefinition) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.update(id, definition)
    }

    fn delete(&self, id: TaskId) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn def(source: &str, target: &str, interval: i64) -> TaskDefinition {
        TaskDefinition::new(source, target, interval).unwrap()
    }

    #[test]
    fn test_yaml_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let repo = YamlTaskRepository::new(dir.path().join("tasks.yaml"));
        assert!(repo.list("host").unwrap().is_empty());
    }

    #[test]
    fn test_yaml_crud_roundtrip() {
        let dir = TempDir::new().unwrap();
        let repo = YamlTaskRepository::new(dir.path().join("tasks.yaml"));

        let id = repo.create("host", &def("/a.txt", "/b.txt", 2)).unwrap();
        let rows = repo.list("host").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].source, "/a.txt");
        assert_eq!(rows[0].frequency, 2);

        repo.update(id, &def("/c.txt", "/d.txt", 9)).unwrap();
        let rows = repo.list("host").unwrap();
        assert_eq!(rows[0].target, "/d.txt");
        assert_eq!(rows[0].frequency, 9);

        repo.delete(id).unwrap();
        assert!(repo.list("host").unwrap().is_empty());
    }

    #[test]
    fn test_yaml_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tasks.yaml");

        let id = YamlTaskRepository::new(&path)
            .create("host", &def("/a", "/b", 5))
            .unwrap();

        let reopened = YamlTaskRepository::new(&path);
        let rows = reopened.list("host").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let dir = TempDir::new().unwrap();
        let repo = YamlTaskRepository::new(dir.path().join("tasks.yaml"));

        let first = repo.create("host", &def("/a", "/b", 1)).unwrap();
        let second = repo.create("host", &def("/a", "/b", 1)).unwrap();
        repo.delete(second).unwrap();
        let third = repo.create("host", &def("/a", "/b", 1)).unwrap();

        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn test_list_scoped_by_owner() {
        let repo = InMemoryTaskRepository::new();
        repo.create("host-a", &def("/a", "/b", 1)).unwrap();
        repo.create("host-b", &def("/c", "/d", 1)).unwrap();
        repo.create("host-a", &def("/e", "/f", 1)).unwrap();

        assert_eq!(repo.list("host-a").unwrap().len(), 2);
        assert_eq!(repo.list("host-b").unwrap().len(), 1);
        assert!(repo.list("host-c").unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete_missing_id() {
        let repo = InMemoryTaskRepository::new();
        assert!(matches!(
            repo.update(42, &def("/a", "/b", 1)),
            Err(PersistenceError::NotFound(42))
        ));
        assert!(matches!(repo.delete(42), Err(PersistenceError::NotFound(42))));
    }

    #[test]
    fn test_yaml_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.yaml");
        std::fs::write(&path, "tasks: [this is: not, valid").unwrap();

        let repo = YamlTaskRepository::new(&path);
        assert!(matches!(repo.list("host"), Err(PersistenceError::Format(_))));
    }

    #[test]
    fn test_create_fails_when_ids_exhausted() {
        let repo = InMemoryTaskRepository::new();
        repo.insert_raw(TaskRecord {
            id: TaskId::MAX,
            owner_key: "host".to_string(),
            source: "/a".to_string(),
            target: "/b".to_string(),
            frequency: 1,
        });

        assert!(matches!(
            repo.create("host", &def("/a", "/b", 1)),
            Err(PersistenceError::IdsExhausted)
        ));
        assert_eq!(repo.list("host").unwrap().len(), 1);
    }

    #[test]
    fn test_yaml_create_fails_on_max_id_in_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.yaml");
        std::fs::write(
            &path,
            "next_id: 1\ntasks:\n- id: 9223372036854775807\n  owner_key: host\n  source: /a\n  target: /b\n  frequency: 5\n",
        )
        .unwrap();

        let repo = YamlTaskRepository::new(&path);
        assert!(matches!(
            repo.create("host", &def("/c", "/d", 1)),
            Err(PersistenceError::IdsExhausted)
        ));
        assert_eq!(repo.list("host").unwrap().len(), 1);
    }

    #[test]
    fn test_insert_raw_advances_next_id() {
        let repo = InMemoryTaskRepository::new();
        repo.insert_raw(TaskRecord {
            id: 10,
            owner_key: "host".to_string(),
            source: "/a".to_string(),
            target: "/b".to_string(),
            frequency: 0,
        });
        let id = repo.create("host", &def("/a", "/b", 1)).unwrap();
        assert_eq!(id, 11);
    }
}
