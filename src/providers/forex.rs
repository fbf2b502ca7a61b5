use super::util::{client, decode, read_body, transport_error};
use crate::core::config::ForexProviderConfig;
use crate::core::{RateError, RateResult, RateSource, RawPayload, SourceId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Forex provider quoting every currency against one USD.
pub struct ForexProvider {
    base_url: String,
    currencies: Vec<String>,
}

impl ForexProvider {
    pub fn new(config: &ForexProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            currencies: config
                .currencies
                .iter()
                .map(|c| c.to_uppercase())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default)]
    conversion_rates: BTreeMap<String, f64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

#[async_trait]
impl RateSource for ForexProvider {
    fn source_id(&self) -> SourceId {
        SourceId::Forex
    }

    #[instrument(name = "ForexLatest", skip(self))]
    async fn fetch_live(&self) -> RateResult<RawPayload> {
        let url = format!("{}/latest/USD", self.base_url);
        debug!("Requesting forex rates from {}", url);

        let response = client()
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(SourceId::Forex, e))?;
        let body = read_body(SourceId::Forex, response).await?;
        let data: LatestRatesResponse = decode(SourceId::Forex, &body)?;

        if data.result != "success" {
            return Err(RateError::invalid(
                SourceId::Forex,
                format!(
                    "provider reported {}",
                    data.error_type.as_deref().unwrap_or(&data.result)
                ),
            ));
        }

        let rates = data
            .conversion_rates
            .into_iter()
            .filter(|(code, _)| self.currencies.is_empty() || self.currencies.contains(code))
            .collect();
        Ok(RawPayload::Rates(rates))
    }
}
