use crate::core::{Snapshot, SnapshotSink, SourceId};
use crate::engine::throttle::ThrottleStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Throttle mirror that lives only as long as the process.
#[derive(Default)]
pub struct MemoryThrottleStore {
    inner: Mutex<HashMap<SourceId, DateTime<Utc>>>,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThrottleStore for MemoryThrottleStore {
    async fn load(&self, source: SourceId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().await.get(&source).copied())
    }

    async fn save(&self, source: SourceId, at: DateTime<Utc>) -> Result<()> {
        self.inner.lock().await.insert(source, at);
        Ok(())
    }
}

/// Snapshot history kept in insertion order.
#[derive(Default)]
pub struct MemoryHistory {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SnapshotSink for MemoryHistory {
    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        debug!(trigger = %snapshot.trigger, "Recording snapshot in memory");
        self.snapshots.lock().await.push(snapshot.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.lock().await.last().cloned())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Snapshot>> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.iter().rev().take(limit).cloned().collect())
    }
}
