//! RecencyTracker - worker ごとの直近タスク履歴
//!
//! Appends claimed tasks to a worker's `recent_tasks` and keeps only the last
//! `RECENT_TASKS_LIMIT`. Not debounced: every call that passes the guards
//! writes the full replacement list.
//!
//! Skipped silently when:
//! - `tasks` is empty
//! - the worker does not exist (as of now)
//! - the worker is quarantined

use std::sync::Arc;

use crate::domain::{RECENT_TASKS_LIMIT, RecentTask, SeenTask, StoreError, WorkerKey, WorkerUpdate};
use crate::ports::{Clock, RecordStore};

pub struct RecencyTracker {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl RecencyTracker {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn task_seen(
        &self,
        worker: &WorkerKey,
        tasks: &[SeenTask],
    ) -> Result<(), StoreError> {
        if tasks.is_empty() {
            return Ok(());
        }

        let now = self.clock.now();
        let Some(existing) = self.store.get_worker(worker, now).await? else {
            tracing::debug!(worker = %worker, "task_seen: unknown worker, skipped");
            return Ok(());
        };
        if existing.is_quarantined(now) {
            tracing::debug!(
                worker = %worker,
                quarantine_until = %existing.quarantine_until,
                "task_seen: worker quarantined, skipped"
            );
            return Ok(());
        }

        let recent_tasks = merge_recent(existing.recent_tasks, tasks);
        let update = WorkerUpdate {
            recent_tasks: Some(recent_tasks),
            ..Default::default()
        };
        self.store.update_worker(worker, update).await?;
        Ok(())
    }
}

/// Append the claimed runs and keep the newest `RECENT_TASKS_LIMIT`, oldest first.
pub fn merge_recent(mut recent: Vec<RecentTask>, tasks: &[SeenTask]) -> Vec<RecentTask> {
    recent.extend(tasks.iter().filter_map(SeenTask::as_recent));
    let overflow = recent.len().saturating_sub(RECENT_TASKS_LIMIT);
    recent.drain(..overflow);
    recent
}
