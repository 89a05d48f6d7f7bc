//! Correlation of in-flight tasks with the component that started them.
//!
//! Purely in-memory: a restart forgets every task, and the startup
//! sequence dispatches fresh scans anyway.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shellhub_core::TaskId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Identity of a task-owning component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(u64);

impl OwnerId {
    /// A fresh, process-unique owner id.
    pub fn next() -> Self {
        OwnerId(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Scan,
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub owner: OwnerId,
    /// Source name
    pub name: String,
    pub kind: TaskKind,
}

/// Registry of in-flight tasks.
pub struct TaskRegistry {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a new, monotonically increasing task id.
    pub fn create(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn set(&self, id: TaskId, task: Task) {
        self.tasks.lock().insert(id, task);
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().get(&id).cloned()
    }

    pub fn delete(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().remove(&id)
    }

    /// True iff no remaining task belongs to `owner`.
    pub fn is_empty_for(&self, owner: OwnerId) -> bool {
        !self.tasks.lock().values().any(|task| task.owner == owner)
    }

    /// Some task for source `name` of the given kind.
    pub fn find_by_name(&self, name: &str, kind: TaskKind) -> Option<TaskId> {
        self.tasks
            .lock()
            .iter()
            .find(|(_, task)| task.name == name && task.kind == kind)
            .map(|(id, _)| *id)
    }

    pub fn count_by_name(&self, name: &str, kind: TaskKind) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|task| task.name == name && task.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
