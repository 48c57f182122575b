//! Configuration for the liveness core.
//!
//! `WorkerInfoConfig` is the serializable form (plain seconds), `Timing` is
//! the validated form the components actually use.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::ConfigError;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerInfoConfig {
    /// Minimum spacing of observation writes per key.
    pub update_interval_secs: u64,

    /// Expiration given to a freshly created or extended task queue.
    pub task_queue_ttl_secs: u64,

    /// Expiration given to a freshly created or extended worker.
    pub worker_ttl_secs: u64,

    /// `expires` closer than this to now counts as "about to expire".
    pub near_expiry_secs: u64,

    /// `last_date_active` older than this is refreshed by an observation.
    pub last_active_staleness_secs: u64,

    /// Prune elapsed debounce entries once the map grows past this size.
    /// `None` keeps every entry until the process restarts.
    pub debounce_prune_threshold: Option<usize>,

    /// Cadence of the in-process expiry loop.
    pub expiry_interval_secs: u64,
}

impl Default for WorkerInfoConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 6 * HOUR,
            task_queue_ttl_secs: 5 * DAY,
            worker_ttl_secs: DAY,
            near_expiry_secs: DAY,
            last_active_staleness_secs: DAY / 4,
            debounce_prune_threshold: None,
            expiry_interval_secs: HOUR,
        }
    }
}

/// Validated spans used by the gate, the engine and the expiry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub update_interval: TimeDelta,
    pub task_queue_ttl: TimeDelta,
    pub worker_ttl: TimeDelta,
    pub near_expiry: TimeDelta,
    pub last_active_staleness: TimeDelta,
    pub expiry_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            update_interval: TimeDelta::hours(6),
            task_queue_ttl: TimeDelta::days(5),
            worker_ttl: TimeDelta::days(1),
            near_expiry: TimeDelta::days(1),
            last_active_staleness: TimeDelta::hours(6),
            expiry_interval: Duration::from_secs(HOUR),
        }
    }
}

impl WorkerInfoConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn timing(&self) -> Result<Timing, ConfigError> {
        if self.expiry_interval_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "expiry_interval_secs",
                value: 0,
            });
        }
        Ok(Timing {
            update_interval: span("update_interval_secs", self.update_interval_secs)?,
            task_queue_ttl: span("task_queue_ttl_secs", self.task_queue_ttl_secs)?,
            worker_ttl: span("worker_ttl_secs", self.worker_ttl_secs)?,
            near_expiry: span("near_expiry_secs", self.near_expiry_secs)?,
            last_active_staleness: span(
                "last_active_staleness_secs",
                self.last_active_staleness_secs,
            )?,
            expiry_interval: Duration::from_secs(self.expiry_interval_secs),
        })
    }
}

fn span(field: &'static str, secs: u64) -> Result<TimeDelta, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or(ConfigError::OutOfRange { field, value: secs })
}
