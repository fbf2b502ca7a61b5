pub mod disk;
pub mod memory;

use anyhow::{Context, Result};
use disk::{DiskHistory, DiskThrottleStore};
use fjall::Keyspace;
use std::path::Path;

/// One fjall keyspace shared by every durable collaborator.
pub struct DiskStore {
    keyspace: Keyspace,
}

impl DiskStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        let store_dir = data_path.join("store");
        std::fs::create_dir_all(&store_dir)
            .with_context(|| format!("Failed to create directory: {}", store_dir.display()))?;
        let keyspace = fjall::Config::new(&store_dir)
            .open()
            .with_context(|| format!("Failed to open store at {}", store_dir.display()))?;
        Ok(Self { keyspace })
    }

    pub fn throttle_store(&self) -> Result<DiskThrottleStore> {
        DiskThrottleStore::new(self.keyspace.clone())
    }

    pub fn history(&self) -> Result<DiskHistory> {
        DiskHistory::new(self.keyspace.clone())
    }
}
