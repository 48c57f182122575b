//! InMemoryRecordStore - 開発用・テスト用の RecordStore
//!
//! # 実装詳細
//! - HashMap で task queue / worker rows を管理
//! - tokio::sync::Mutex で排他制御（各操作はロック内で完結 = atomic）
//! - create は identity が既に存在すれば `StoreError::Conflict`
//! - 書き込み回数を数える（debounce の効果をテストで確認するため）

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    StoreError, TaskQueueId, TaskQueueRecord, TaskQueueUpdate, WorkerKey, WorkerRecord,
    WorkerUpdate,
};
use crate::ports::RecordStore;

/// Number of create/update calls that reached the store, per record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub task_queues: u64,
    pub workers: u64,
}

#[derive(Default)]
struct InMemoryStoreState {
    task_queues: HashMap<TaskQueueId, TaskQueueRecord>,
    workers: HashMap<WorkerKey, WorkerRecord>,
    writes: WriteCounts,
}

/// In-memory record store.
#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<InMemoryStoreState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn write_counts(&self) -> WriteCounts {
        self.state.lock().await.writes
    }

    pub async fn task_queue_count(&self) -> usize {
        self.state.lock().await.task_queues.len()
    }

    pub async fn worker_count(&self) -> usize {
        self.state.lock().await.workers.len()
    }

    /// Raw row lookup, ignoring `expires`.
    pub async fn task_queue(&self, task_queue_id: &TaskQueueId) -> Option<TaskQueueRecord> {
        self.state.lock().await.task_queues.get(task_queue_id).cloned()
    }

    /// Raw row lookup, ignoring `expires`.
    pub async fn worker(&self, key: &WorkerKey) -> Option<WorkerRecord> {
        self.state.lock().await.workers.get(key).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_task_queue(
        &self,
        task_queue_id: &TaskQueueId,
        as_of: DateTime<Utc>,
    ) -> Result<Option<TaskQueueRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .task_queues
            .get(task_queue_id)
            .filter(|record| record.expires > as_of)
            .cloned())
    }

    async fn create_task_queue(&self, record: TaskQueueRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.task_queues.contains_key(&record.task_queue_id) {
            let id = &record.task_queue_id;
            return Err(StoreError::Conflict(format!("{} {id}", id.kind())));
        }
        state.writes.task_queues += 1;
        state
            .task_queues
            .insert(record.task_queue_id.clone(), record);
        Ok(())
    }

    async fn update_task_queue(
        &self,
        task_queue_id: &TaskQueueId,
        update: TaskQueueUpdate,
    ) -> Result<TaskQueueRecord, StoreError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.task_queues.get_mut(task_queue_id) else {
            return Err(StoreError::NotFound(format!(
                "{} {task_queue_id}",
                task_queue_id.kind()
            )));
        };
        record.apply(update);
        let updated = record.clone();
        state.writes.task_queues += 1;
        Ok(updated)
    }

    async fn get_worker(
        &self,
        key: &WorkerKey,
        as_of: DateTime<Utc>,
    ) -> Result<Option<WorkerRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .workers
            .get(key)
            .filter(|record| record.expires > as_of)
            .cloned())
    }

    async fn create_worker(&self, record: WorkerRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.workers.contains_key(&record.key) {
            let key = &record.key;
            return Err(StoreError::Conflict(format!("{} {key}", key.worker_id.kind())));
        }
        state.writes.workers += 1;
        state.workers.insert(record.key.clone(), record);
        Ok(())
    }

    async fn update_worker(
        &self,
        key: &WorkerKey,
        update: WorkerUpdate,
    ) -> Result<WorkerRecord, StoreError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.workers.get_mut(key) else {
            return Err(StoreError::NotFound(format!("{} {key}", key.worker_id.kind())));
        };
        record.apply(update);
        let updated = record.clone();
        state.writes.workers += 1;
        Ok(updated)
    }

    async fn expire_task_queues(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.task_queues.len();
        state.task_queues.retain(|_, record| record.expires >= cutoff);
        Ok((before - state.task_queues.len()) as u64)
    }

    async fn expire_workers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.workers.len();
        state.workers.retain(|_, record| record.expires >= cutoff);
        Ok((before - state.workers.len()) as u64)
    }
}
