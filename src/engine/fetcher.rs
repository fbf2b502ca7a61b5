//! Single upstream call raced against a timer, plus payload validation.

use crate::core::{
    BuySell, RateError, RateQuote, RateResult, RateSource, RateValue, RawPayload, SourceId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SourceFetcher {
    source: Arc<dyn RateSource>,
}

impl SourceFetcher {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    pub fn source_id(&self) -> SourceId {
        self.source.source_id()
    }

    /// Fetches and validates one quote.
    ///
    /// The upstream call runs as its own task. When the timer wins, the task
    /// is left to finish on its own and its output is dropped unread, so a
    /// late response can never reach the caller.
    pub async fn fetch(&self, timeout: Duration) -> RateResult<RateQuote> {
        let source_id = self.source_id();
        let source = Arc::clone(&self.source);
        let call = tokio::spawn(async move { source.fetch_live().await });

        let payload = match tokio::time::timeout(timeout, call).await {
            Err(_) => {
                warn!(source = %source_id, ?timeout, "Upstream timed out, abandoning call");
                return Err(RateError::Timeout { source_id, timeout });
            }
            Ok(Err(join_err)) => {
                return Err(RateError::network(
                    source_id,
                    format!("upstream task failed: {join_err}"),
                ));
            }
            Ok(Ok(result)) => result?,
        };

        let value = validate_payload(source_id, payload)?;
        debug!(source = %source_id, ?value, "Fetched live rate");
        Ok(RateQuote::live(source_id, value))
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Turns a raw payload into a servable value, rejecting empty or all-zero data.
pub fn validate_payload(source_id: SourceId, payload: RawPayload) -> RateResult<RateValue> {
    match payload {
        RawPayload::Offers(prices) => {
            let usable: Vec<f64> = prices.into_iter().filter(|p| positive(*p)).collect();
            if usable.is_empty() {
                return Err(RateError::invalid(source_id, "no priced offers"));
            }
            let average = usable.iter().sum::<f64>() / usable.len() as f64;
            Ok(RateValue::Single(average))
        }
        RawPayload::Rates(rates) => {
            let rates: BTreeMap<String, f64> =
                rates.into_iter().filter(|(_, r)| positive(*r)).collect();
            if rates.is_empty() {
                return Err(RateError::invalid(source_id, "no positive exchange rates"));
            }
            Ok(RateValue::Table(rates))
        }
        RawPayload::Quotes(quotes) => {
            let pairs: BTreeMap<String, BuySell> = quotes
                .into_iter()
                .map(|q| {
                    (
                        q.name,
                        BuySell {
                            buy: q.buy,
                            sell: q.sell,
                        },
                    )
                })
                .filter(|(_, pair)| pair.is_usable())
                .collect();
            if pairs.is_empty() {
                return Err(RateError::invalid(source_id, "all buy/sell pairs are zero"));
            }
            Ok(RateValue::Pairs(pairs))
        }
    }
}
