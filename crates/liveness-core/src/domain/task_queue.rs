//! Task queue record and its partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::TaskQueueId;

/// Stability label of a task queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    #[default]
    Experimental,
    Stable,
    Deprecated,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stability::Experimental => "experimental",
            Stability::Stable => "stable",
            Stability::Deprecated => "deprecated",
        };
        f.write_str(label)
    }
}

/// Durable liveness row of a task queue.
///
/// - `expires` is only ever pushed forward by observations; the expiry sweep
///   is the only thing that removes the row.
/// - `last_date_active` is refreshed by observations, throttled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueueRecord {
    pub task_queue_id: TaskQueueId,
    pub expires: DateTime<Utc>,
    pub last_date_active: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stability: Stability,
}

impl TaskQueueRecord {
    /// A freshly observed queue with default description and stability.
    pub fn new(task_queue_id: TaskQueueId, expires: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            task_queue_id,
            expires,
            last_date_active: now,
            description: String::new(),
            stability: Stability::default(),
        }
    }

    /// Apply a partial update in place. `None` fields are left untouched.
    pub fn apply(&mut self, update: TaskQueueUpdate) {
        if let Some(expires) = update.expires {
            self.expires = expires;
        }
        if let Some(last_date_active) = update.last_date_active {
            self.last_date_active = last_date_active;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(stability) = update.stability {
            self.stability = stability;
        }
    }
}

/// Fields to write on an existing task queue row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQueueUpdate {
    pub expires: Option<DateTime<Utc>>,
    pub last_date_active: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub stability: Option<Stability>,
}
