use super::util::{client, decode, read_body, transport_error};
use crate::core::config::BrokerProviderConfig;
use crate::core::{BrokerQuote, RateResult, RateSource, RawPayload, SourceId};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Comparison broker listing buy/sell quotes from several remittance services.
pub struct BrokerProvider {
    base_url: String,
    fiat: String,
}

impl BrokerProvider {
    pub fn new(config: &BrokerProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fiat: config.fiat.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ComparisonResponse {
    #[serde(default)]
    providers: Vec<ProviderQuote>,
}

#[derive(Debug, Deserialize)]
struct ProviderQuote {
    name: String,
    #[serde(default)]
    buy: f64,
    #[serde(default)]
    sell: f64,
}

#[async_trait]
impl RateSource for BrokerProvider {
    fn source_id(&self) -> SourceId {
        SourceId::Broker
    }

    #[instrument(name = "BrokerComparison", skip(self), fields(fiat = %self.fiat))]
    async fn fetch_live(&self) -> RateResult<RawPayload> {
        let url = format!("{}/rates?from=USD&to={}", self.base_url, self.fiat);
        debug!("Requesting broker comparison from {}", url);

        let response = client()
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(SourceId::Broker, e))?;
        let body = read_body(SourceId::Broker, response).await?;
        let data: ComparisonResponse = decode(SourceId::Broker, &body)?;

        let quotes = data
            .providers
            .into_iter()
            .map(|p| BrokerQuote {
                name: p.name,
                buy: p.buy,
                sell: p.sell,
            })
            .collect();
        Ok(RawPayload::Quotes(quotes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RateError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_successful_comparison_fetch() {
        let mock_server = MockServer::start().await;
        let mock_response = r#"{
            "providers": [
                {"name": "Wise", "buy": 36.1, "sell": 36.9},
                {"name": "Remitly", "buy": 36.0}
            ]
        }"#;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .and(query_param("from", "USD"))
            .and(query_param("to", "VES"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let provider = BrokerProvider::new(&BrokerProviderConfig {
            base_url: mock_server.uri(),
            fiat: "VES".to_string(),
        });
        let payload = provider.fetch_live().await.unwrap();
        assert_eq!(
            payload,
            RawPayload::Quotes(vec![
                BrokerQuote {
                    name: "Wise".to_string(),
                    buy: 36.1,
                    sell: 36.9
                },
                BrokerQuote {
                    name: "Remitly".to_string(),
                    buy: 36.0,
                    sell: 0.0
                },
            ])
        );
    }

    #[tokio::test]
    async fn test_unreachable_broker() {
        // Nothing listens on port 9 (discard) in the test environment
        let provider = BrokerProvider::new(&BrokerProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            fiat: "VES".to_string(),
        });
        let err = provider.fetch_live().await.unwrap_err();
        assert!(matches!(
            err,
            RateError::Network {
                source_id: SourceId::Broker,
                ..
            }
        ));
    }
}
