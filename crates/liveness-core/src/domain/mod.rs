//! Domain model (ids, records, updates, errors).

pub mod errors;
pub mod ids;
pub mod task_queue;
pub mod worker;

pub use errors::{ConfigError, StoreError};
pub use ids::{TaskId, TaskQueueId, WorkerGroup, WorkerId, WorkerKey};
pub use task_queue::{Stability, TaskQueueRecord, TaskQueueUpdate};
pub use worker::{RECENT_TASKS_LIMIT, RecentTask, SeenTask, WorkerRecord, WorkerUpdate};
