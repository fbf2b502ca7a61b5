//! Upstream rate source abstractions

use crate::core::error::RateResult;
use crate::core::quote::SourceId;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerQuote {
    pub name: String,
    pub buy: f64,
    pub sell: f64,
}

/// Payload as reshaped by an upstream, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Advertised marketplace prices in listing order.
    Offers(Vec<f64>),
    /// Units of each currency per one USD.
    Rates(BTreeMap<String, f64>),
    /// Named buy/sell quotes from a comparison broker.
    Quotes(Vec<BrokerQuote>),
}

#[async_trait]
pub trait RateSource: Send + Sync {
    fn source_id(&self) -> SourceId;

    async fn fetch_live(&self) -> RateResult<RawPayload>;
}
