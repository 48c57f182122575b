use std::sync::Arc;

use liveness_core::domain::{SeenTask, TaskQueueId, WorkerKey};
use liveness_core::impls::InMemoryRecordStore;
use liveness_core::ports::SystemClock;
use liveness_core::{WorkerInfo, WorkerInfoConfig};
use rand::Rng;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

const QUEUES: [&str; 2] = ["proj-build/linux", "proj-test/windows"];
const WORKERS_PER_QUEUE: usize = 3;
const CLAIMS: usize = 200;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 設定ファイル（JSON）があれば読む。なければ default。
fn load_config() -> Result<WorkerInfoConfig, BoxError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(WorkerInfoConfig::from_json_str(&json)?)
        }
        None => Ok(WorkerInfoConfig::default()),
    }
}

/// worker：claim のたびに seen + task_seen を呼ぶ
async fn worker_claims(info: &WorkerInfo, key: &WorkerKey) -> Result<(), BoxError> {
    // 1) queue / worker が生きていることを報告（大半は debounce で吸収される）
    info.seen(
        &key.task_queue_id,
        Some(&key.worker_group),
        Some(&key.worker_id),
    )
    .await?;

    // 2) claim したタスクを履歴に記録
    let run_count = rand::thread_rng().gen_range(1..=3);
    let task = SeenTask::new(Ulid::new().to_string(), run_count);
    info.task_seen(key, &[task]).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) store と WorkerInfo を用意
    let config = load_config()?;
    let store = Arc::new(InMemoryRecordStore::new());
    let info = Arc::new(WorkerInfo::new(
        store.clone(),
        Arc::new(SystemClock),
        &config,
    )?);

    // (B) expiry loop を起動
    let expiry = info.spawn_expiry_loop();

    // (C) worker fleet を用意
    let fleet: Vec<WorkerKey> = QUEUES
        .iter()
        .flat_map(|queue| {
            (0..WORKERS_PER_QUEUE)
                .map(move |i| WorkerKey::new(*queue, "us-east-1", format!("i-{i:04}")))
        })
        .collect();

    // (D) claim を並行に流す
    let mut joins = Vec::with_capacity(CLAIMS);
    for _ in 0..CLAIMS {
        let pick = rand::thread_rng().gen_range(0..fleet.len());
        let key = fleet[pick].clone();
        let info = Arc::clone(&info);
        joins.push(tokio::spawn(async move { worker_claims(&info, &key).await }));
        sleep(Duration::from_millis(1)).await;
    }
    for join in joins {
        join.await??;
    }

    // (E) 結果
    let writes = store.write_counts().await;
    tracing::info!(
        claims = CLAIMS,
        task_queue_writes = writes.task_queues,
        worker_writes = writes.workers,
        debounce_entries = info.upserts().gate().len(),
        "simulation finished"
    );
    for queue in QUEUES {
        if let Some(record) = store.task_queue(&TaskQueueId::new(queue)).await {
            tracing::info!(
                task_queue_id = %record.task_queue_id,
                expires = %record.expires,
                last_date_active = %record.last_date_active,
                stability = %record.stability,
                "task queue"
            );
        }
    }
    for key in &fleet {
        if let Some(worker) = store.worker(key).await {
            tracing::info!(
                worker = %key,
                expires = %worker.expires,
                recent_tasks = worker.recent_tasks.len(),
                "worker"
            );
        }
    }

    // (F) 停止
    expiry.shutdown_and_join().await;
    Ok(())
}
