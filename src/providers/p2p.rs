use super::util::{client, decode, read_body, transport_error};
use crate::core::config::P2pProviderConfig;
use crate::core::{RateResult, RateSource, RawPayload, SourceId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Peer-to-peer marketplace search, reached through the credential proxy.
pub struct P2pProvider {
    base_url: String,
    asset: String,
    fiat: String,
    trade_type: String,
    rows: usize,
}

impl P2pProvider {
    pub fn new(config: &P2pProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            asset: config.asset.clone(),
            fiat: config.fiat.clone(),
            trade_type: config.trade_type.clone(),
            rows: config.rows.max(1),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    asset: &'a str,
    fiat: &'a str,
    trade_type: &'a str,
    page: u32,
    rows: usize,
    pay_types: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Advertisement>,
}

#[derive(Deserialize, Debug)]
struct Advertisement {
    adv: AdvertisementDetail,
}

#[derive(Deserialize, Debug)]
struct AdvertisementDetail {
    price: String,
}

#[async_trait]
impl RateSource for P2pProvider {
    fn source_id(&self) -> SourceId {
        SourceId::P2p
    }

    #[instrument(
        name = "P2pSearch",
        skip(self),
        fields(asset = %self.asset, fiat = %self.fiat)
    )]
    async fn fetch_live(&self) -> RateResult<RawPayload> {
        let url = format!("{}/p2p/search", self.base_url);
        let request = SearchRequest {
            asset: &self.asset,
            fiat: &self.fiat,
            trade_type: &self.trade_type,
            page: 1,
            rows: self.rows,
            pay_types: Vec::new(),
        };
        debug!("Requesting marketplace offers from {}", url);

        let response = client()
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SourceId::P2p, e))?;
        let body = read_body(SourceId::P2p, response).await?;
        let search: SearchResponse = decode(SourceId::P2p, &body)?;

        let offers: Vec<f64> = search
            .data
            .iter()
            .take(self.rows)
            .filter_map(|ad| ad.adv.price.trim().parse::<f64>().ok())
            .collect();
        debug!(count = offers.len(), "Received marketplace offers");

        Ok(RawPayload::Offers(offers))
    }
}
