//! Rate quotes and their provenance

use crate::core::error::{RateError, RateResult};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// One external rate provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    P2p,
    Forex,
    Broker,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::P2p, SourceId::Forex, SourceId::Broker];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::P2p => "p2p",
            SourceId::Forex => "forex",
            SourceId::Broker => "broker",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p2p" => Ok(SourceId::P2p),
            "forex" => Ok(SourceId::Forex),
            "broker" => Ok(SourceId::Broker),
            _ => Err(anyhow!("Invalid source: {}", s)),
        }
    }
}

/// Where a served rate came from, used for trust indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Live,
    Cache,
    LastKnownGood,
    Default,
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Origin::Live => "live",
                Origin::Cache => "cache",
                Origin::LastKnownGood => "last known good",
                Origin::Default => "default",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuySell {
    pub buy: f64,
    pub sell: f64,
}

impl BuySell {
    /// Both sides non-negative and at least one of them priced.
    pub fn is_usable(&self) -> bool {
        self.buy.is_finite()
            && self.sell.is_finite()
            && self.buy >= 0.0
            && self.sell >= 0.0
            && (self.buy > 0.0 || self.sell > 0.0)
    }
}

/// Rate payload carried by a quote. The forex table holds units of each
/// currency per one USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RateValue {
    Single(f64),
    Table(BTreeMap<String, f64>),
    Pairs(BTreeMap<String, BuySell>),
}

impl RateValue {
    pub fn is_usable(&self) -> bool {
        let positive = |v: &f64| v.is_finite() && *v > 0.0;
        match self {
            RateValue::Single(v) => positive(v),
            RateValue::Table(rates) => !rates.is_empty() && rates.values().all(positive),
            RateValue::Pairs(pairs) => !pairs.is_empty() && pairs.values().all(BuySell::is_usable),
        }
    }

    pub fn as_single(&self) -> Option<f64> {
        match self {
            RateValue::Single(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            RateValue::Table(rates) => Some(rates),
            _ => None,
        }
    }

    pub fn as_pairs(&self) -> Option<&BTreeMap<String, BuySell>> {
        match self {
            RateValue::Pairs(pairs) => Some(pairs),
            _ => None,
        }
    }
}

/// An immutable rate observation. Changing provenance produces a new quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub source: SourceId,
    pub value: RateValue,
    pub fetched_at: DateTime<Utc>,
    pub origin: Origin,
}

impl RateQuote {
    pub fn live(source: SourceId, value: RateValue) -> Self {
        Self {
            source,
            value,
            fetched_at: Utc::now(),
            origin: Origin::Live,
        }
    }

    /// The hardcoded value served when nothing better exists.
    pub fn fallback(source: SourceId, value: RateValue) -> Self {
        Self {
            source,
            value,
            fetched_at: Utc::now(),
            origin: Origin::Default,
        }
    }

    pub fn with_origin(&self, origin: Origin) -> Self {
        Self {
            origin,
            ..self.clone()
        }
    }
}

/// Results that may parse fine yet carry nothing worth serving.
pub trait Usable {
    fn check_usable(&self) -> RateResult<()>;
}

impl Usable for RateQuote {
    fn check_usable(&self) -> RateResult<()> {
        if self.value.is_usable() {
            Ok(())
        } else {
            Err(RateError::invalid(
                self.source,
                "quote carries zero or negative values",
            ))
        }
    }
}

impl Usable for f64 {
    fn check_usable(&self) -> RateResult<()> {
        if self.is_finite() && *self > 0.0 {
            Ok(())
        } else {
            Err(RateError::Validation(format!(
                "expected a positive value, got {self}"
            )))
        }
    }
}
