// libs/appointment-cell/src/services/locks.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use calendar_cell::SlotId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, warn};

use shared_models::SchedulingError;

/// Guards for one or more slots, released on drop.
#[derive(Debug)]
pub struct SlotGuard {
    slots: Vec<SlotId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SlotGuard {
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }
}

/// Per-slot async mutexes. Operations on the same slot are serialized,
/// different slots proceed in parallel.
#[derive(Debug, Default)]
pub struct SlotLockRegistry {
    locks: Mutex<HashMap<SlotId, Arc<AsyncMutex<()>>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, slot: &SlotId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(*slot).or_default().clone()
    }

    /// Locks every slot in ascending order so two multi-slot operations can
    /// never wait on each other in a cycle. Fails with a transient error when
    /// any lock is not granted within `wait`.
    pub async fn acquire(&self, slots: &[SlotId], wait: Duration) -> Result<SlotGuard, SchedulingError> {
        let ordered: BTreeSet<SlotId> = slots.iter().copied().collect();
        let mut guards = Vec::with_capacity(ordered.len());

        for slot in &ordered {
            let handle = self.handle(slot);
            match timeout(wait, handle.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    warn!("Timed out after {:?} waiting for slot lock {}", wait, slot);
                    return Err(SchedulingError::TransientStorage(format!(
                        "lock contention on slot {}",
                        slot
                    )));
                }
            }
        }

        debug!("Acquired {} slot lock(s)", guards.len());
        Ok(SlotGuard {
            slots: ordered.into_iter().collect(),
            _guards: guards,
        })
    }

    /// Drops registry entries nobody is holding or waiting on.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
