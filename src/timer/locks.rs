use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::OwnerId;

/// Entries nobody holds are dropped once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// Lock table serializing read-modify-write cycles per owner.
#[derive(Default)]
pub struct OwnerLocks {
    table: Mutex<HashMap<OwnerId, Arc<AsyncMutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, owner: &OwnerId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = match self.table.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if table.len() >= PRUNE_THRESHOLD {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            table.entry(owner.clone()).or_default().clone()
        };
        entry.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().map(|table| table.len()).unwrap_or(0)
    }
}
