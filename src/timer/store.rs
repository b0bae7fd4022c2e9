//! Keyed storage of live timers, at most one per owner.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::Database;

use super::{OwnerId, TimerRecord};

/// Each call is atomic. Writes for the same owner are last-writer-wins.
#[async_trait]
pub trait TimerStore: Send + Sync {
    async fn upsert(&self, owner: &OwnerId, record: TimerRecord) -> Result<()>;
    async fn get(&self, owner: &OwnerId) -> Result<Option<TimerRecord>>;
    /// Returns `true` if a record was removed.
    async fn delete(&self, owner: &OwnerId) -> Result<bool>;
}

#[async_trait]
impl TimerStore for Database {
    async fn upsert(&self, owner: &OwnerId, record: TimerRecord) -> Result<()> {
        let record = TimerRecord {
            owner: owner.clone(),
            ..record
        };
        self.upsert_timer(&record).await
    }

    async fn get(&self, owner: &OwnerId) -> Result<Option<TimerRecord>> {
        self.get_timer(owner).await
    }

    async fn delete(&self, owner: &OwnerId) -> Result<bool> {
        self.delete_timer(owner).await
    }
}

/// Non-durable store, for tests and single-process deployments without a database.
#[derive(Default)]
pub struct MemoryTimerStore {
    timers: Mutex<HashMap<OwnerId, TimerRecord>>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.timers.lock().await.len()
    }
}

#[async_trait]
impl TimerStore for MemoryTimerStore {
    async fn upsert(&self, owner: &OwnerId, record: TimerRecord) -> Result<()> {
        let record = TimerRecord {
            owner: owner.clone(),
            ..record
        };
        self.timers.lock().await.insert(owner.clone(), record);
        Ok(())
    }

    async fn get(&self, owner: &OwnerId) -> Result<Option<TimerRecord>> {
        Ok(self.timers.lock().await.get(owner).cloned())
    }

    async fn delete(&self, owner: &OwnerId) -> Result<bool> {
        Ok(self.timers.lock().await.remove(owner).is_some())
    }
}
