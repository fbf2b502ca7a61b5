//! Cooldown bookkeeping for live fetch attempts.

use crate::core::SourceId;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Durable mirror of the last attempt per source, surviving restarts.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    async fn load(&self, source: SourceId) -> Result<Option<DateTime<Utc>>>;

    async fn save(&self, source: SourceId, at: DateTime<Utc>) -> Result<()>;
}

pub struct AttemptThrottle {
    attempts: Mutex<HashMap<SourceId, DateTime<Utc>>>,
    store: Arc<dyn ThrottleStore>,
}

impl AttemptThrottle {
    pub fn new(store: Arc<dyn ThrottleStore>) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// The later of the in-memory and persisted timestamps.
    pub async fn last_attempt(&self, source: SourceId) -> Option<DateTime<Utc>> {
        let persisted = match self.store.load(source).await {
            Ok(at) => at,
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to load persisted throttle state");
                None
            }
        };
        let mut attempts = self.attempts.lock().await;
        let latest = match (attempts.get(&source).copied(), persisted) {
            (Some(mem), Some(disk)) => Some(mem.max(disk)),
            (mem, disk) => mem.or(disk),
        };
        if let Some(at) = latest {
            attempts.insert(source, at);
        }
        latest
    }

    pub async fn should_attempt(&self, source: SourceId, cooldown: Duration, forced: bool) -> bool {
        self.should_attempt_at(source, cooldown, forced, Utc::now())
            .await
    }

    pub async fn should_attempt_at(
        &self,
        source: SourceId,
        cooldown: Duration,
        forced: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if forced {
            return true;
        }
        let Some(last) = self.last_attempt(source).await else {
            return true;
        };
        // A clock that moved backwards counts as no time elapsed
        let elapsed = now.signed_duration_since(last).to_std().unwrap_or_default();
        let allowed = elapsed > cooldown;
        if !allowed {
            debug!(source = %source, ?elapsed, ?cooldown, "Cooldown active");
        }
        allowed
    }

    /// Records one network attempt. Older timestamps never replace newer ones.
    pub async fn record_attempt(&self, source: SourceId, at: DateTime<Utc>) {
        {
            let mut attempts = self.attempts.lock().await;
            match attempts.get(&source) {
                Some(existing) if *existing >= at => return,
                _ => {
                    attempts.insert(source, at);
                }
            }
        }
        if let Err(e) = self.store.save(source, at).await {
            warn!(source = %source, error = %e, "Failed to persist throttle state");
        }
    }
}
