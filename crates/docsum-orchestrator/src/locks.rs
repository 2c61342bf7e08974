use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use docsum_types::DocumentId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SlotMap = HashMap<DocumentId, Arc<AsyncMutex<()>>>;

/// Keyed mutual exclusion over document identities.
///
/// Each identity gets a reference-counted async mutex on first use. The map
/// entry is dropped again when the last guard for it is released, so the map
/// only holds identities with an analysis in flight.
#[derive(Debug, Clone, Default)]
pub struct IdentityLocks {
    slots: Arc<Mutex<SlotMap>>,
}

/// Held while one caller drives an identity through fetch, analyze and store.
#[derive(Debug)]
pub struct IdentityLockGuard {
    id: DocumentId,
    locks: IdentityLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other caller holds `id`, then holds it.
    pub async fn acquire(&self, id: &DocumentId) -> IdentityLockGuard {
        let slot = {
            let mut slots = self.lock_slots();
            Arc::clone(slots.entry(id.clone()).or_default())
        };
        let guard = slot.lock_owned().await;
        IdentityLockGuard {
            id: id.clone(),
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    pub fn is_held(&self, id: &DocumentId) -> bool {
        self.lock_slots()
            .get(id)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of identities currently held or waited on.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_slots(&self) -> MutexGuard<'_, SlotMap> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityLockGuard {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }
}

impl Drop for IdentityLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.lock_slots();
        // Only the map's own reference left: nobody holds or waits on it.
        if slots
            .get(&self.id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.id);
        }
    }
}
