//! RecordStore port - liveness rows の正本（source of truth）
//!
//! RecordStore は以下を管理します：
//! - task queue rows（key: TaskQueueId）
//! - worker rows（key: WorkerKey）
//! - 期限切れ rows の一括削除（predicate は store 側）
//!
//! # 実装
//! - **InMemoryRecordStore**: 開発用・テスト用（`impls::inmem_store`）
//! - 本番用は relational store を想定（別クレート）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    StoreError, TaskQueueId, TaskQueueRecord, TaskQueueUpdate, WorkerKey, WorkerRecord,
    WorkerUpdate,
};

/// RecordStore は task queue / worker rows を保持
///
/// # 設計原則
/// - 各操作は単独で atomic
/// - identity の一意性は store が保証する（create の重複は `StoreError::Conflict`）
/// - `get_*` は `as_of` 時点で有効な（`expires > as_of`）rows のみ返す
/// - timeout / cancellation は実装側の責務
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_task_queue(
        &self,
        task_queue_id: &TaskQueueId,
        as_of: DateTime<Utc>,
    ) -> Result<Option<TaskQueueRecord>, StoreError>;

    /// Fails with `StoreError::Conflict` if the identity already exists.
    async fn create_task_queue(&self, record: TaskQueueRecord) -> Result<(), StoreError>;

    async fn update_task_queue(
        &self,
        task_queue_id: &TaskQueueId,
        update: TaskQueueUpdate,
    ) -> Result<TaskQueueRecord, StoreError>;

    async fn get_worker(
        &self,
        key: &WorkerKey,
        as_of: DateTime<Utc>,
    ) -> Result<Option<WorkerRecord>, StoreError>;

    /// Fails with `StoreError::Conflict` if the identity already exists.
    async fn create_worker(&self, record: WorkerRecord) -> Result<(), StoreError>;

    async fn update_worker(
        &self,
        key: &WorkerKey,
        update: WorkerUpdate,
    ) -> Result<WorkerRecord, StoreError>;

    /// Remove task queue rows whose `expires` precedes `cutoff`. Returns the count.
    async fn expire_task_queues(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Remove worker rows whose `expires` precedes `cutoff`. Returns the count.
    async fn expire_workers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
