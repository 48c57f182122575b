//! Worker record, recent-task entries and the worker partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TaskId, WorkerKey};

/// Most recent tasks kept per worker.
pub const RECENT_TASKS_LIMIT: usize = 20;

/// One entry of a worker's recent task history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTask {
    pub task_id: TaskId,
    pub run_id: u32,
}

/// A task claimed by a worker, as reported to `task_seen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenTask {
    pub task_id: TaskId,
    /// Number of runs the task has, including the one just claimed.
    pub run_count: u32,
}

impl SeenTask {
    pub fn new(task_id: impl Into<TaskId>, run_count: u32) -> Self {
        Self {
            task_id: task_id.into(),
            run_count,
        }
    }

    /// The run just claimed, or `None` if the task reports no runs.
    pub fn as_recent(&self) -> Option<RecentTask> {
        let run_id = self.run_count.checked_sub(1)?;
        Some(RecentTask {
            task_id: self.task_id.clone(),
            run_id,
        })
    }
}

/// Durable liveness row of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    #[serde(flatten)]
    pub key: WorkerKey,
    pub expires: DateTime<Utc>,
    /// Set once at creation.
    pub first_claim: DateTime<Utc>,
    pub quarantine_until: DateTime<Utc>,
    /// Oldest first, at most `RECENT_TASKS_LIMIT` entries.
    #[serde(default)]
    pub recent_tasks: Vec<RecentTask>,
}

impl WorkerRecord {
    /// A freshly observed worker: not quarantined, no history.
    pub fn new(key: WorkerKey, expires: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            key,
            expires,
            first_claim: now,
            quarantine_until: now,
            recent_tasks: Vec::new(),
        }
    }

    pub fn is_quarantined(&self, now: DateTime<Utc>) -> bool {
        self.quarantine_until > now
    }

    /// Apply a partial update in place. `first_claim` is never touched.
    pub fn apply(&mut self, update: WorkerUpdate) {
        if let Some(expires) = update.expires {
            self.expires = expires;
        }
        if let Some(quarantine_until) = update.quarantine_until {
            self.quarantine_until = quarantine_until;
        }
        if let Some(recent_tasks) = update.recent_tasks {
            self.recent_tasks = recent_tasks;
        }
    }
}

/// Fields to write on an existing worker row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerUpdate {
    pub expires: Option<DateTime<Utc>>,
    pub quarantine_until: Option<DateTime<Utc>>,
    /// Full replacement list.
    pub recent_tasks: Option<Vec<RecentTask>>,
}
