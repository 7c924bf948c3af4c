use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Registry of per-plan exclusion locks.
///
/// Work against one plan is serialized; different plans never contend.
#[derive(Debug, Default)]
pub struct PlanLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl PlanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `plan_id`. The guard may be moved into a spawned task.
    pub async fn acquire(&self, plan_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(plan_id).or_default())
        };
        slot.lock_owned().await
    }

    /// Drops the slot for a deleted plan once nobody else holds or awaits it.
    pub fn forget(&self, plan_id: Uuid) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&plan_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&plan_id);
        }
    }

    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
