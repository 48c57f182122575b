//! Domain identifiers (strongly-typed names).
//!
//! Task queues, worker groups, workers and tasks are all identified by opaque
//! strings handed to us by the API layer. We never parse them, but we do keep
//! them apart at compile time: `Name<T>` holds the string and `T` is a
//! zero-sized marker (PhantomData), so a `WorkerId` cannot be passed where a
//! `TaskQueueId` is expected.
//!
//! Serialized transparently as the plain string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker trait for each kind of name.
pub trait NameMarker: Send + Sync + 'static {
    /// Human-readable kind, used in error messages.
    fn kind() -> &'static str;
}

/// Generic opaque name.
///
/// # 例
/// ```ignore
/// let queue: TaskQueueId = Name::new("proj/builder");
/// let worker: WorkerId = Name::new("i-0abc");
/// // queue と worker は異なる型なので、混同できない
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Name<T: NameMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: NameMarker> Name<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> &'static str {
        T::kind()
    }
}

impl<T: NameMarker> From<&str> for Name<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: NameMarker> From<String> for Name<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: NameMarker> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task queue marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskQueue {}

impl NameMarker for TaskQueue {
    fn kind() -> &'static str {
        "task queue"
    }
}

/// Worker group marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {}

impl NameMarker for Group {
    fn kind() -> &'static str {
        "worker group"
    }
}

/// Worker marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Worker {}

impl NameMarker for Worker {
    fn kind() -> &'static str {
        "worker"
    }
}

/// Task marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl NameMarker for Task {
    fn kind() -> &'static str {
        "task"
    }
}

// ========================================
// Type Alias
// ========================================

/// Identifier of a task queue (unique key of a `TaskQueueRecord`).
pub type TaskQueueId = Name<TaskQueue>;

/// Worker group inside a task queue.
pub type WorkerGroup = Name<Group>;

/// Worker identifier inside a worker group.
pub type WorkerId = Name<Worker>;

/// Identifier of a task claimed by a worker.
pub type TaskId = Name<Task>;

/// Identity tuple of a worker: `(task_queue_id, worker_group, worker_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerKey {
    pub task_queue_id: TaskQueueId,
    pub worker_group: WorkerGroup,
    pub worker_id: WorkerId,
}

impl WorkerKey {
    pub fn new(
        task_queue_id: impl Into<TaskQueueId>,
        worker_group: impl Into<WorkerGroup>,
        worker_id: impl Into<WorkerId>,
    ) -> Self {
        Self {
            task_queue_id: task_queue_id.into(),
            worker_group: worker_group.into(),
            worker_id: worker_id.into(),
        }
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.task_queue_id, self.worker_group, self.worker_id
        )
    }
}
