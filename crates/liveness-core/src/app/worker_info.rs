//! WorkerInfo - API 層から呼ばれる表面
//!
//! Wires the gate, the upsert engine, the recency tracker and the sweeper
//! over one `RecordStore` and one `Clock`. Construct it once per process; the
//! debounce state lives as long as this value does.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::config::{Timing, WorkerInfoConfig};
use super::expiry::{ExpiryLoop, ExpiryReport, ExpirySweeper};
use super::recency::RecencyTracker;
use super::upsert::{TaskQueueFields, UpsertEngine, WorkerFields};
use crate::domain::{
    ConfigError, SeenTask, StoreError, TaskQueueId, TaskQueueRecord, WorkerGroup, WorkerId,
    WorkerKey, WorkerRecord,
};
use crate::ports::{Clock, RecordStore};

pub struct WorkerInfo {
    upserts: UpsertEngine,
    recency: RecencyTracker,
    sweeper: Arc<ExpirySweeper>,
    clock: Arc<dyn Clock>,
    timing: Timing,
}

impl WorkerInfo {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        config: &WorkerInfoConfig,
    ) -> Result<Self, ConfigError> {
        let timing = config.timing()?;
        Ok(Self {
            upserts: UpsertEngine::new(
                store.clone(),
                clock.clone(),
                timing,
                config.debounce_prune_threshold,
            ),
            recency: RecencyTracker::new(store.clone(), clock.clone()),
            sweeper: Arc::new(ExpirySweeper::new(store)),
            clock,
            timing,
        })
    }

    pub fn upserts(&self) -> &UpsertEngine {
        &self.upserts
    }

    /// A task queue (and, when both are given, a worker in it) was seen active.
    ///
    /// The queue and worker observations run concurrently. Both run to
    /// completion; if either failed the first error is returned, and whatever
    /// the other one wrote stays written.
    pub async fn seen(
        &self,
        task_queue_id: &TaskQueueId,
        worker_group: Option<&WorkerGroup>,
        worker_id: Option<&WorkerId>,
    ) -> Result<(), StoreError> {
        let worker = match (worker_group, worker_id) {
            (Some(group), Some(id)) => Some(WorkerKey {
                task_queue_id: task_queue_id.clone(),
                worker_group: group.clone(),
                worker_id: id.clone(),
            }),
            _ => None,
        };

        let queue_seen = self.upserts.observe_queue(task_queue_id);
        let worker_seen = async {
            match &worker {
                Some(key) => self.upserts.observe_worker(key).await,
                None => Ok(()),
            }
        };

        let (queue_result, worker_result) = tokio::join!(queue_seen, worker_seen);
        queue_result.and(worker_result)
    }

    /// A worker claimed `tasks`; recorded in its recent task history.
    pub async fn task_seen(
        &self,
        worker: &WorkerKey,
        tasks: &[SeenTask],
    ) -> Result<(), StoreError> {
        self.recency.task_seen(worker, tasks).await
    }

    pub async fn upsert_task_queue(
        &self,
        fields: TaskQueueFields,
    ) -> Result<TaskQueueRecord, StoreError> {
        self.upserts.upsert_task_queue(fields).await
    }

    pub async fn upsert_worker(&self, fields: WorkerFields) -> Result<WorkerRecord, StoreError> {
        self.upserts.upsert_worker(fields).await
    }

    pub async fn expire(&self, cutoff: DateTime<Utc>) -> Result<ExpiryReport, StoreError> {
        self.sweeper.expire(cutoff).await
    }

    /// Start sweeping on `expiry_interval` from the config.
    pub fn spawn_expiry_loop(&self) -> ExpiryLoop {
        ExpiryLoop::spawn(
            self.sweeper.clone(),
            self.clock.clone(),
            self.timing.expiry_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecentTask, TaskId, TaskQueueUpdate, WorkerUpdate};
    use crate::impls::InMemoryRecordStore;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (Arc<FixedClock>, Arc<InMemoryRecordStore>, WorkerInfo) {
        let clock = Arc::new(FixedClock::new(start()));
        let store = Arc::new(InMemoryRecordStore::new());
        let info =
            WorkerInfo::new(store.clone(), clock.clone(), &WorkerInfoConfig::default()).unwrap();
        (clock, store, info)
    }

    #[tokio::test]
    async fn seen_twice_within_interval_writes_once() {
        let (clock, store, info) = setup();
        let q1 = TaskQueueId::new("q1");
        let g1 = WorkerGroup::new("g1");
        let w1 = WorkerId::new("w1");

        info.seen(&q1, Some(&g1), Some(&w1)).await.unwrap();
        info.seen(&q1, Some(&g1), Some(&w1)).await.unwrap();
        let counts = store.write_counts().await;
        assert_eq!((counts.task_queues, counts.workers), (1, 1));

        clock.advance(TimeDelta::hours(6));
        info.seen(&q1, Some(&g1), Some(&w1)).await.unwrap();
        let counts = store.write_counts().await;
        assert_eq!((counts.task_queues, counts.workers), (2, 2));
    }

    #[tokio::test]
    async fn seen_without_full_worker_identity_touches_queue_only() {
        let (_clock, store, info) = setup();
        let q1 = TaskQueueId::new("q1");

        info.seen(&q1, Some(&WorkerGroup::new("g1")), None).await.unwrap();
        info.seen(&TaskQueueId::new("q2"), None, None).await.unwrap();

        assert_eq!(store.task_queue_count().await, 2);
        assert_eq!(store.worker_count().await, 0);
    }

    #[tokio::test]
    async fn task_seen_on_worker_created_by_seen() {
        let (_clock, store, info) = setup();
        let key = WorkerKey::new("q1", "g1", "w1");

        info.seen(
            &key.task_queue_id,
            Some(&key.worker_group),
            Some(&key.worker_id),
        )
        .await
        .unwrap();
        info.task_seen(&key, &[SeenTask::new("T1", 1)]).await.unwrap();

        let worker = store.worker(&key).await.unwrap();
        assert_eq!(
            worker.recent_tasks,
            vec![RecentTask {
                task_id: TaskId::new("T1"),
                run_id: 0,
            }]
        );
    }

    #[tokio::test]
    async fn quarantine_via_upsert_blocks_task_seen() {
        let (clock, store, info) = setup();
        let key = WorkerKey::new("q1", "g1", "w1");

        info.upsert_worker(WorkerFields {
            quarantine_until: Some(start() + TimeDelta::hours(2)),
            ..WorkerFields::new(key.clone())
        })
        .await
        .unwrap();
        info.task_seen(&key, &[SeenTask::new("T1", 1)]).await.unwrap();
        assert!(store.worker(&key).await.unwrap().recent_tasks.is_empty());

        clock.advance(TimeDelta::hours(3));
        info.task_seen(&key, &[SeenTask::new("T2", 2)]).await.unwrap();
        assert_eq!(store.worker(&key).await.unwrap().recent_tasks.len(), 1);
    }

    #[tokio::test]
    async fn lapsed_rows_are_swept_once() {
        let (clock, store, info) = setup();
        info.seen(
            &TaskQueueId::new("q1"),
            Some(&WorkerGroup::new("g1")),
            Some(&WorkerId::new("w1")),
        )
        .await
        .unwrap();

        clock.advance(TimeDelta::days(6));
        let cutoff = clock.now();
        let first = info.expire(cutoff).await.unwrap();
        let second = info.expire(cutoff).await.unwrap();

        assert_eq!(
            first,
            ExpiryReport {
                task_queues: 1,
                workers: 1
            }
        );
        assert_eq!(second, ExpiryReport::default());
        assert_eq!(store.task_queue_count().await, 0);
    }

    #[tokio::test]
    async fn lapsed_but_unswept_queue_is_not_recreated() {
        let (clock, store, info) = setup();
        let q1 = TaskQueueId::new("q1");
        info.seen(&q1, None, None).await.unwrap();

        // the row reads as absent, create conflicts, conflict is absorbed
        clock.advance(TimeDelta::days(6));
        info.seen(&q1, None, None).await.unwrap();

        assert_eq!(store.task_queue_count().await, 1);
        assert_eq!(store.write_counts().await.task_queues, 1);
    }

    /// Task queue writes succeed, worker writes fail.
    struct WorkerOutage {
        inner: InMemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for WorkerOutage {
        async fn get_task_queue(
            &self,
            id: &TaskQueueId,
            as_of: DateTime<Utc>,
        ) -> Result<Option<TaskQueueRecord>, StoreError> {
            self.inner.get_task_queue(id, as_of).await
        }
        async fn create_task_queue(&self, record: TaskQueueRecord) -> Result<(), StoreError> {
            self.inner.create_task_queue(record).await
        }
        async fn update_task_queue(
            &self,
            id: &TaskQueueId,
            update: TaskQueueUpdate,
        ) -> Result<TaskQueueRecord, StoreError> {
            self.inner.update_task_queue(id, update).await
        }
        async fn get_worker(
            &self,
            _key: &WorkerKey,
            _as_of: DateTime<Utc>,
        ) -> Result<Option<WorkerRecord>, StoreError> {
            Err(StoreError::Unavailable("worker table offline".into()))
        }
        async fn create_worker(&self, _record: WorkerRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("worker table offline".into()))
        }
        async fn update_worker(
            &self,
            _key: &WorkerKey,
            _update: WorkerUpdate,
        ) -> Result<WorkerRecord, StoreError> {
            Err(StoreError::Unavailable("worker table offline".into()))
        }
        async fn expire_task_queues(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.expire_task_queues(cutoff).await
        }
        async fn expire_workers(&self, _cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("worker table offline".into()))
        }
    }

    #[tokio::test]
    async fn worker_failure_fails_seen_but_keeps_queue_write() {
        let clock = Arc::new(FixedClock::new(start()));
        let store = Arc::new(WorkerOutage {
            inner: InMemoryRecordStore::new(),
        });
        let info =
            WorkerInfo::new(store.clone(), clock, &WorkerInfoConfig::default()).unwrap();
        let q1 = TaskQueueId::new("q1");

        let err = info
            .seen(&q1, Some(&WorkerGroup::new("g1")), Some(&WorkerId::new("w1")))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.inner.task_queue(&q1).await.is_some());

        // the sweep stops at the first failing kind
        assert!(info.expire(start()).await.is_err());
    }

    /// Reads take a few milliseconds, so overlapping observations interleave.
    struct SlowReads {
        inner: InMemoryRecordStore,
    }

    impl SlowReads {
        async fn pause() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[async_trait]
    impl RecordStore for SlowReads {
        async fn get_task_queue(
            &self,
            id: &TaskQueueId,
            as_of: DateTime<Utc>,
        ) -> Result<Option<TaskQueueRecord>, StoreError> {
            Self::pause().await;
            self.inner.get_task_queue(id, as_of).await
        }
        async fn create_task_queue(&self, record: TaskQueueRecord) -> Result<(), StoreError> {
            self.inner.create_task_queue(record).await
        }
        async fn update_task_queue(
            &self,
            id: &TaskQueueId,
            update: TaskQueueUpdate,
        ) -> Result<TaskQueueRecord, StoreError> {
            self.inner.update_task_queue(id, update).await
        }
        async fn get_worker(
            &self,
            key: &WorkerKey,
            as_of: DateTime<Utc>,
        ) -> Result<Option<WorkerRecord>, StoreError> {
            Self::pause().await;
            self.inner.get_worker(key, as_of).await
        }
        async fn create_worker(&self, record: WorkerRecord) -> Result<(), StoreError> {
            self.inner.create_worker(record).await
        }
        async fn update_worker(
            &self,
            key: &WorkerKey,
            update: WorkerUpdate,
        ) -> Result<WorkerRecord, StoreError> {
            self.inner.update_worker(key, update).await
        }
        async fn expire_task_queues(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.expire_task_queues(cutoff).await
        }
        async fn expire_workers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.expire_workers(cutoff).await
        }
    }

    #[tokio::test]
    async fn overlapping_seen_calls_write_once() {
        let clock = Arc::new(FixedClock::new(start()));
        let store = Arc::new(SlowReads {
            inner: InMemoryRecordStore::new(),
        });
        let info =
            WorkerInfo::new(store.clone(), clock.clone(), &WorkerInfoConfig::default()).unwrap();
        let q1 = TaskQueueId::new("q1");
        let g1 = WorkerGroup::new("g1");
        let w1 = WorkerId::new("w1");

        let (a, b) = tokio::join!(
            info.seen(&q1, Some(&g1), Some(&w1)),
            info.seen(&q1, Some(&g1), Some(&w1))
        );
        a.unwrap();
        b.unwrap();
        let counts = store.inner.write_counts().await;
        assert_eq!((counts.task_queues, counts.workers), (1, 1));

        // window elapsed: again exactly one refresh per key
        clock.advance(TimeDelta::hours(7));
        let (a, b) = tokio::join!(
            info.seen(&q1, Some(&g1), Some(&w1)),
            info.seen(&q1, Some(&g1), Some(&w1))
        );
        a.unwrap();
        b.unwrap();
        let counts = store.inner.write_counts().await;
        assert_eq!((counts.task_queues, counts.workers), (2, 2));
        assert_eq!(info.upserts().gate().len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = WorkerInfoConfig {
            expiry_interval_secs: 0,
            ..Default::default()
        };
        let result = WorkerInfo::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(FixedClock::new(start())),
            &config,
        );
        assert!(result.is_err());
    }
}
