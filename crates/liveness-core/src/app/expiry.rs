//! ExpirySweeper / ExpiryLoop - 期限切れ rows の回収
//!
//! # フロー
//! 1. `expire_task_queues(cutoff)` で expires < cutoff の task queue を削除
//! 2. `expire_workers(cutoff)` で expires < cutoff の worker を削除
//! 3. 件数を報告
//!
//! Selection lives in the store. Running the same cutoff twice removes
//! nothing the second time.
//!
//! `ExpiryLoop` is the optional in-process scheduler: it sweeps with
//! `cutoff = clock.now()` every `interval` until shutdown is requested.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::StoreError;
use crate::ports::{Clock, RecordStore};

/// Rows removed by one sweep, per record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    pub task_queues: u64,
    pub workers: u64,
}

pub struct ExpirySweeper {
    store: Arc<dyn RecordStore>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn expire(&self, cutoff: DateTime<Utc>) -> Result<ExpiryReport, StoreError> {
        let task_queues = self.store.expire_task_queues(cutoff).await?;
        tracing::info!(%cutoff, count = task_queues, "expire: task queues");

        let workers = self.store.expire_workers(cutoff).await?;
        tracing::info!(%cutoff, count = workers, "expire: workers");

        Ok(ExpiryReport {
            task_queues,
            workers,
        })
    }
}

/// Handle of a running expiry loop.
/// - `request_shutdown()` でループを止める
/// - `shutdown_and_join()` で終了を待つ
pub struct ExpiryLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ExpiryLoop {
    /// Spawn the loop. The first sweep runs immediately.
    pub fn spawn(sweeper: Arc<ExpirySweeper>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // handle dropped
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }

                if let Err(e) = sweeper.expire(clock.now()).await {
                    tracing::warn!(error = %e, "expire loop: sweep failed");
                }
            }
        });

        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}
