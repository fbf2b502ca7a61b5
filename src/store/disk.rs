use crate::core::{Snapshot, SnapshotSink, SourceId};
use crate::engine::throttle::ThrottleStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::debug;

/// Throttle mirror stored in the `throttle` partition, one key per source.
pub struct DiskThrottleStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskThrottleStore {
    pub fn new(keyspace: Keyspace) -> Result<Self> {
        let partition = keyspace
            .open_partition("throttle", PartitionCreateOptions::default())
            .context("Failed to open throttle partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl ThrottleStore for DiskThrottleStore {
    async fn load(&self, source: SourceId) -> Result<Option<DateTime<Utc>>> {
        match self.partition.get(source.as_str().as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, source: SourceId, at: DateTime<Utc>) -> Result<()> {
        self.partition
            .insert(source.as_str().as_bytes(), serde_json::to_vec(&at)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(source = %source, %at, "Persisted throttle state");
        Ok(())
    }
}

/// Snapshot history keyed by capture time so iteration order is chronological.
pub struct DiskHistory {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskHistory {
    pub fn new(keyspace: Keyspace) -> Result<Self> {
        let partition = keyspace
            .open_partition("history", PartitionCreateOptions::default())
            .context("Failed to open history partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn key(taken_at: &DateTime<Utc>) -> Vec<u8> {
        // Pre-epoch timestamps clamp to zero; they do not occur in practice
        (taken_at.timestamp_micros().max(0) as u64)
            .to_be_bytes()
            .to_vec()
    }
}

#[async_trait]
impl SnapshotSink for DiskHistory {
    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        self.partition.insert(
            Self::key(&snapshot.taken_at),
            serde_json::to_vec(snapshot)?,
        )?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(taken_at = %snapshot.taken_at, "Persisted snapshot");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<Snapshot>> {
        Ok(self.recent(1).await?.into_iter().next())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::with_capacity(limit);
        for item in self.partition.iter().rev().take(limit) {
            let (_key, value) = item?;
            snapshots.push(
                serde_json::from_slice(&value).context("Failed to decode stored snapshot")?,
            );
        }
        Ok(snapshots)
    }
}
