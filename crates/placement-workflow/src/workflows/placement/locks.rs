use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

/// Lazily created mutex per key (application id, job id).
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `key`. Lock it with [`hold`].
    pub fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut slots = hold(&self.slots);
        if slots.len() >= PRUNE_THRESHOLD {
            // Only the map references an idle slot.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        hold(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock ignoring poison: the guarded sections leave no partial state behind a panic.
pub fn hold<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
