//! DebounceGate - observation を間引く
//!
//! Maps an observation key to the earliest time the next write for it is
//! allowed. The first observation of a key always passes; after a successful
//! write the key is closed for `update_interval`. Observations inside the
//! window are absorbed without touching the map.
//!
//! Checking and claiming a key is one step (`try_begin`): the winner holds a
//! `PersistPermit` and the key reads as in flight until the permit is
//! committed or dropped, so concurrent observations of the same key in this
//! process produce one write. A dropped, uncommitted permit (store error,
//! cancelled future) reopens the key.
//!
//! State is process-local and lives until the process restarts. With
//! `prune_threshold` set, entries whose window has already elapsed are dropped
//! once the map grows past the threshold; an elapsed entry and a missing one
//! both let the next write through, so pruning is not observable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{TaskQueueId, WorkerKey};
use crate::ports::Clock;
use crate::ports::clock::later;

/// What an observation is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObservationKey {
    TaskQueue(TaskQueueId),
    Worker(WorkerKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    /// A write for the key is under way.
    InFlight,
    /// No write before this time.
    Until(DateTime<Utc>),
}

pub struct DebounceGate {
    windows: Mutex<HashMap<ObservationKey, Window>>,
    update_interval: TimeDelta,
    prune_threshold: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl DebounceGate {
    pub fn new(
        clock: Arc<dyn Clock>,
        update_interval: TimeDelta,
        prune_threshold: Option<usize>,
    ) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            update_interval,
            prune_threshold,
            clock,
        }
    }

    // never held across an await
    fn windows(&self) -> MutexGuard<'_, HashMap<ObservationKey, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an observation of `key` arriving now should reach the store.
    pub fn should_persist(&self, key: &ObservationKey) -> bool {
        let now = self.clock.now();
        is_open(self.windows().get(key), now)
    }

    /// Claim `key` for one write. `None` if the window is closed or another
    /// write for the key is already in flight.
    pub fn try_begin(&self, key: &ObservationKey) -> Option<PersistPermit<'_>> {
        let now = self.clock.now();
        let mut windows = self.windows();
        if !is_open(windows.get(key), now) {
            return None;
        }
        windows.insert(key.clone(), Window::InFlight);
        Some(PersistPermit {
            gate: self,
            key: key.clone(),
            committed: false,
        })
    }

    /// Close the window for `key` after a successful write.
    pub fn record_persisted(&self, key: ObservationKey) {
        let now = self.clock.now();
        let mut windows = self.windows();
        windows.insert(key, Window::Until(later(now, self.update_interval)));

        if let Some(threshold) = self.prune_threshold
            && windows.len() > threshold
        {
            let before = windows.len();
            windows.retain(|_, window| !is_open(Some(window), now));
            tracing::debug!(
                pruned = before - windows.len(),
                remaining = windows.len(),
                "debounce: pruned elapsed entries"
            );
        }
    }

    fn release(&self, key: &ObservationKey) {
        let mut windows = self.windows();
        if windows.get(key) == Some(&Window::InFlight) {
            windows.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.windows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows().is_empty()
    }
}

fn is_open(window: Option<&Window>, now: DateTime<Utc>) -> bool {
    match window {
        None => true,
        Some(Window::InFlight) => false,
        Some(Window::Until(at)) => now >= *at,
    }
}

/// Exclusive right to write one observation of a key.
///
/// `commit` after the write succeeded closes the window; dropping the permit
/// without committing reopens the key.
#[must_use]
pub struct PersistPermit<'a> {
    gate: &'a DebounceGate,
    key: ObservationKey,
    committed: bool,
}

impl PersistPermit<'_> {
    pub fn commit(mut self) {
        self.committed = true;
        self.gate.record_persisted(self.key.clone());
    }
}

impl Drop for PersistPermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.gate.release(&self.key);
        }
    }
}
