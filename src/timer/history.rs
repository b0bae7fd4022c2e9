//! Outbound seam for recording completed intervals.

use anyhow::Result;
use async_trait::async_trait;

use crate::db::{Database, HistoryEntry};

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<()>;
}

#[async_trait]
impl HistorySink for Database {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        self.insert_session(&entry).await
    }
}
