//! UpsertEngine - get → (update | create) against the RecordStore
//!
//! # フロー（observation）
//! 1. DebounceGate で間引く（window 内、または同じ key の書き込みが進行中なら何もしない）
//! 2. `as_of = now` で現在の row を読む
//! 3. あれば refresh（near-expiry のときだけ `expires` を延長）
//! 4. なければ default 値で create
//! 5. create が `StoreError::Conflict` なら他の creator が勝ったので成功扱い
//!
//! There is no cross-process lock around this sequence. Two first
//! observations of the same key may both reach step 4; the store's
//! uniqueness constraint lets exactly one row in and the loser absorbs the
//! conflict.
//!
//! The administrative paths (`upsert_task_queue`, `upsert_worker`) share the
//! same get-or-create shape but bypass the gate and write the caller's values
//! as given. When their create conflicts, the row exists (another creator, or
//! a lapsed row not yet swept), so the caller's values are applied to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::Timing;
use super::debounce::{DebounceGate, ObservationKey};
use crate::domain::{
    Stability, StoreError, TaskQueueId, TaskQueueRecord, TaskQueueUpdate, WorkerKey,
    WorkerRecord, WorkerUpdate,
};
use crate::ports::clock::{earlier, later};
use crate::ports::{Clock, RecordStore};

/// Caller-supplied values for an administrative task queue write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueueFields {
    pub task_queue_id: TaskQueueId,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stability: Option<Stability>,
}

impl TaskQueueFields {
    /// No values supplied: existing rows keep theirs, new rows get defaults.
    pub fn new(task_queue_id: impl Into<TaskQueueId>) -> Self {
        Self {
            task_queue_id: task_queue_id.into(),
            expires: None,
            description: None,
            stability: None,
        }
    }
}

/// Caller-supplied values for an administrative worker write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerFields {
    #[serde(flatten)]
    pub key: WorkerKey,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quarantine_until: Option<DateTime<Utc>>,
}

impl WorkerFields {
    pub fn new(key: WorkerKey) -> Self {
        Self {
            key,
            expires: None,
            quarantine_until: None,
        }
    }
}

/// Decides which timestamps an observation refresh writes.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    timing: Timing,
}

impl RefreshPolicy {
    pub fn new(timing: Timing) -> Self {
        Self { timing }
    }

    pub fn fresh_task_queue_expires(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        later(now, self.timing.task_queue_ttl)
    }

    pub fn fresh_worker_expires(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        later(now, self.timing.worker_ttl)
    }

    /// `expires` is "about to expire" when it falls inside the near-expiry window.
    pub fn is_near_expiry(&self, expires: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        expires < later(now, self.timing.near_expiry)
    }

    /// Extend to `fresh` only when `current` is about to expire. Never moves backwards.
    pub fn next_expires(
        &self,
        current: DateTime<Utc>,
        fresh: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        if self.is_near_expiry(current, now) {
            current.max(fresh)
        } else {
            current
        }
    }

    pub fn next_last_date_active(
        &self,
        current: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        if current < earlier(now, self.timing.last_active_staleness) {
            now
        } else {
            current
        }
    }
}

pub struct UpsertEngine {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    gate: DebounceGate,
    policy: RefreshPolicy,
}

impl UpsertEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        timing: Timing,
        prune_threshold: Option<usize>,
    ) -> Self {
        let gate = DebounceGate::new(clock.clone(), timing.update_interval, prune_threshold);
        Self {
            store,
            clock,
            gate,
            policy: RefreshPolicy::new(timing),
        }
    }

    pub fn gate(&self) -> &DebounceGate {
        &self.gate
    }

    /// Liveness ping for a task queue, throttled by the gate.
    pub async fn observe_queue(&self, task_queue_id: &TaskQueueId) -> Result<(), StoreError> {
        let key = ObservationKey::TaskQueue(task_queue_id.clone());
        let Some(permit) = self.gate.try_begin(&key) else {
            tracing::debug!(task_queue_id = %task_queue_id, "observe: absorbed by debounce");
            return Ok(());
        };

        self.refresh_task_queue(task_queue_id).await?;
        permit.commit();
        Ok(())
    }

    /// Liveness ping for a worker, throttled by the gate.
    pub async fn observe_worker(&self, worker: &WorkerKey) -> Result<(), StoreError> {
        let key = ObservationKey::Worker(worker.clone());
        let Some(permit) = self.gate.try_begin(&key) else {
            tracing::debug!(worker = %worker, "observe: absorbed by debounce");
            return Ok(());
        };

        self.refresh_worker(worker).await?;
        permit.commit();
        Ok(())
    }

    async fn refresh_task_queue(&self, task_queue_id: &TaskQueueId) -> Result<(), StoreError> {
        let now = self.clock.now();
        let fresh = self.policy.fresh_task_queue_expires(now);

        if let Some(existing) = self.store.get_task_queue(task_queue_id, now).await? {
            let update = TaskQueueUpdate {
                expires: Some(self.policy.next_expires(existing.expires, fresh, now)),
                last_date_active: Some(
                    self.policy
                        .next_last_date_active(existing.last_date_active, now),
                ),
                ..Default::default()
            };
            self.store.update_task_queue(task_queue_id, update).await?;
            tracing::debug!(task_queue_id = %task_queue_id, "observe: task queue refreshed");
            return Ok(());
        }

        let record = TaskQueueRecord::new(task_queue_id.clone(), fresh, now);
        if absorb_conflict(self.store.create_task_queue(record).await)? {
            tracing::debug!(task_queue_id = %task_queue_id, "observe: task queue created");
        }
        Ok(())
    }

    async fn refresh_worker(&self, worker: &WorkerKey) -> Result<(), StoreError> {
        let now = self.clock.now();
        let fresh = self.policy.fresh_worker_expires(now);

        if let Some(existing) = self.store.get_worker(worker, now).await? {
            let update = WorkerUpdate {
                expires: Some(self.policy.next_expires(existing.expires, fresh, now)),
                ..Default::default()
            };
            self.store.update_worker(worker, update).await?;
            tracing::debug!(worker = %worker, "observe: worker refreshed");
            return Ok(());
        }

        let record = WorkerRecord::new(worker.clone(), fresh, now);
        if absorb_conflict(self.store.create_worker(record).await)? {
            tracing::debug!(worker = %worker, "observe: worker created");
        }
        Ok(())
    }

    /// Administrative write of a task queue; not debounced.
    pub async fn upsert_task_queue(
        &self,
        fields: TaskQueueFields,
    ) -> Result<TaskQueueRecord, StoreError> {
        let now = self.clock.now();
        let task_queue_id = fields.task_queue_id;

        if self.store.get_task_queue(&task_queue_id, now).await?.is_some() {
            let update = TaskQueueUpdate {
                expires: fields.expires,
                last_date_active: None,
                description: fields.description,
                stability: fields.stability,
            };
            return self.store.update_task_queue(&task_queue_id, update).await;
        }

        let expires = fields
            .expires
            .unwrap_or_else(|| self.policy.fresh_task_queue_expires(now));
        let mut candidate = TaskQueueRecord::new(task_queue_id.clone(), expires, now);
        if let Some(description) = fields.description.clone() {
            candidate.description = description;
        }
        if let Some(stability) = fields.stability {
            candidate.stability = stability;
        }

        if absorb_conflict(self.store.create_task_queue(candidate.clone()).await)? {
            return Ok(candidate);
        }
        // the row exists (a concurrent creator, or lapsed but not yet swept)
        let update = TaskQueueUpdate {
            expires: Some(expires),
            last_date_active: None,
            description: fields.description,
            stability: fields.stability,
        };
        self.store.update_task_queue(&task_queue_id, update).await
    }

    /// Administrative write of a worker; not debounced.
    pub async fn upsert_worker(&self, fields: WorkerFields) -> Result<WorkerRecord, StoreError> {
        let now = self.clock.now();
        let key = fields.key;

        if self.store.get_worker(&key, now).await?.is_some() {
            let update = WorkerUpdate {
                expires: fields.expires,
                quarantine_until: fields.quarantine_until,
                recent_tasks: None,
            };
            return self.store.update_worker(&key, update).await;
        }

        let expires = fields
            .expires
            .unwrap_or_else(|| self.policy.fresh_worker_expires(now));
        let mut candidate = WorkerRecord::new(key.clone(), expires, now);
        if let Some(quarantine_until) = fields.quarantine_until {
            candidate.quarantine_until = quarantine_until;
        }

        if absorb_conflict(self.store.create_worker(candidate.clone()).await)? {
            return Ok(candidate);
        }
        let update = WorkerUpdate {
            expires: Some(expires),
            quarantine_until: fields.quarantine_until,
            recent_tasks: None,
        };
        self.store.update_worker(&key, update).await
    }
}

/// `Ok(true)` if created, `Ok(false)` if another creator already holds the identity.
fn absorb_conflict(result: Result<(), StoreError>) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_conflict() => {
            tracing::debug!(error = %err, "create: identity already exists, keeping existing row");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
