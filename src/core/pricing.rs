//! Cost price calculations.
//!
//! Everything here is pure: a base rate and margins go in, prices come out.
//! A price of `0.0` marks a currency that could not be priced.
use crate::core::error::{RateError, RateResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conversion friction between the base asset and USD.
pub const TRANSFER_FEE: f64 = 0.001;

pub const USD: &str = "USD";

/// Currency code to customer-facing cost price.
pub type CostPriceSet = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginSettings {
    pub usd_margin_percent: f64,
    pub other_currencies_margin_percent: f64,
}

impl Default for MarginSettings {
    fn default() -> Self {
        Self {
            usd_margin_percent: 2.5,
            other_currencies_margin_percent: 3.0,
        }
    }
}

impl MarginSettings {
    pub fn validate(&self) -> RateResult<()> {
        for (name, value) in [
            ("usd_margin_percent", self.usd_margin_percent),
            ("other_currencies_margin_percent", self.other_currencies_margin_percent),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RateError::Validation(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

fn priceable(base_rate: f64) -> bool {
    base_rate.is_finite() && base_rate > 0.0
}

/// `base_rate * (1 + margin/100)`, or 0 when the base rate is unusable.
pub fn compute_usd_cost(base_rate: f64, usd_margin_percent: f64) -> f64 {
    if !priceable(base_rate) {
        return 0.0;
    }
    base_rate * (1.0 + usd_margin_percent / 100.0)
}

/// Prices a non-USD currency quoted as units per one USD.
pub fn compute_other_currency_cost(
    base_rate: f64,
    fx_rate_to_usd: f64,
    margin_percent: f64,
    transfer_fee: f64,
) -> f64 {
    if !priceable(base_rate) || !fx_rate_to_usd.is_finite() || fx_rate_to_usd <= 0.0 {
        return 0.0;
    }
    (base_rate * (1.0 - transfer_fee)) / fx_rate_to_usd * (1.0 + margin_percent / 100.0)
}

/// Builds a fresh set with a USD entry plus one entry per forex currency.
pub fn compute_cost_prices(
    base_rate: f64,
    fx_rates: &BTreeMap<String, f64>,
    margins: &MarginSettings,
) -> CostPriceSet {
    let mut prices = CostPriceSet::new();
    prices.insert(
        USD.to_string(),
        compute_usd_cost(base_rate, margins.usd_margin_percent),
    );
    for (currency, fx_rate) in fx_rates {
        if currency == USD {
            continue;
        }
        prices.insert(
            currency.clone(),
            compute_other_currency_cost(
                base_rate,
                *fx_rate,
                margins.other_currencies_margin_percent,
                TRANSFER_FEE,
            ),
        );
    }
    prices
}

/// Like [`compute_cost_prices`] but rejects bad input instead of pricing it at zero.
pub fn price_manual_rate(
    base_rate: f64,
    fx_rates: &BTreeMap<String, f64>,
    margins: &MarginSettings,
) -> RateResult<CostPriceSet> {
    if !priceable(base_rate) {
        return Err(RateError::Validation(format!(
            "rate must be a positive number, got {base_rate}"
        )));
    }
    margins.validate()?;
    Ok(compute_cost_prices(base_rate, fx_rates, margins))
}

/// Holds the latest cost prices and exactly one previous set.
#[derive(Debug, Default, Clone)]
pub struct CostPriceBook {
    current: Option<CostPriceSet>,
    previous: Option<CostPriceSet>,
}

impl CostPriceBook {
    /// Swaps in a whole new set and returns the one it displaced.
    pub fn replace(&mut self, next: CostPriceSet) -> Option<CostPriceSet> {
        self.previous = self.current.replace(next);
        self.previous.clone()
    }

    pub fn current(&self) -> Option<&CostPriceSet> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&CostPriceSet> {
        self.previous.as_ref()
    }

    /// Current minus previous for currencies priced in both sets.
    pub fn deltas(&self) -> BTreeMap<String, f64> {
        match (&self.current, &self.previous) {
            (Some(current), Some(previous)) => price_deltas(current, previous),
            _ => BTreeMap::new(),
        }
    }
}

pub fn price_deltas(current: &CostPriceSet, previous: &CostPriceSet) -> BTreeMap<String, f64> {
    current
        .iter()
        .filter_map(|(currency, price)| {
            previous
                .get(currency)
                .filter(|old| **old > 0.0 && *price > 0.0)
                .map(|old| (currency.clone(), price - old))
        })
        .collect()
}
