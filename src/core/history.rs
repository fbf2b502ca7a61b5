//! Historical snapshot abstractions

use crate::core::pricing::CostPriceSet;
use crate::core::quote::{RateQuote, SourceId};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// What caused a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    #[default]
    Auto,
    Refresh,
}

impl Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TriggerKind::Auto => "auto",
                TriggerKind::Refresh => "refresh",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub trigger: TriggerKind,
    pub quotes: BTreeMap<SourceId, RateQuote>,
    pub cost_prices: CostPriceSet,
}

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, snapshot: &Snapshot) -> Result<()>;

    async fn latest(&self) -> Result<Option<Snapshot>>;

    /// Most recent snapshots first.
    async fn recent(&self, limit: usize) -> Result<Vec<Snapshot>>;
}
