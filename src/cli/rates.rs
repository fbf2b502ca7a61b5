use super::ui;
use crate::core::RateValue;
use crate::core::pricing::USD;
use crate::engine::{RateEngine, RefreshOptions, RefreshOutcome};
use anyhow::Result;
use comfy_table::Cell;

/// Renders a rate value on one line.
pub fn format_value(value: &RateValue) -> String {
    match value {
        RateValue::Single(rate) => format!("{rate:.2}"),
        RateValue::Table(rates) => rates
            .iter()
            .map(|(currency, rate)| format!("{currency} {rate:.4}"))
            .collect::<Vec<_>>()
            .join(", "),
        RateValue::Pairs(pairs) => pairs
            .iter()
            .map(|(name, pair)| format!("{name} {:.2}/{:.2}", pair.buy, pair.sell))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub fn render_outcome(outcome: &RefreshOutcome) -> String {
    let mut quotes = ui::new_styled_table();
    quotes.set_header(vec![
        ui::header_cell("Source"),
        ui::header_cell("Rate"),
        ui::header_cell("Origin"),
        ui::header_cell("Fetched at"),
    ]);
    for quote in outcome.quotes.values() {
        quotes.add_row(vec![
            Cell::new(quote.source.to_string()),
            Cell::new(format_value(&quote.value)),
            ui::origin_cell(quote.origin),
            Cell::new(quote.fetched_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ]);
    }

    let deltas = outcome.deltas();
    let mut prices = ui::new_styled_table();
    prices.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Cost price"),
        ui::header_cell("Change"),
    ]);
    // USD first, the rest alphabetically
    let ordered = outcome
        .cost_prices
        .get_key_value(USD)
        .into_iter()
        .chain(outcome.cost_prices.iter().filter(|(c, _)| c.as_str() != USD));
    for (currency, price) in ordered {
        prices.add_row(vec![
            Cell::new(currency),
            ui::amount_cell(*price),
            ui::delta_cell(deltas.get(currency).copied()),
        ]);
    }

    let mut output = format!("{}\n\n", ui::style_text("Rates", ui::StyleType::Title));
    output.push_str(&quotes.to_string());
    output.push_str(&format!(
        "\n\n{}\n\n",
        ui::style_text("Cost prices", ui::StyleType::Title)
    ));
    output.push_str(&prices.to_string());
    if !outcome.updated {
        output.push_str(&format!(
            "\n{}",
            ui::style_text("No live data in this refresh", ui::StyleType::Subtle)
        ));
    }
    output
}

pub async fn run(engine: &RateEngine, options: RefreshOptions) -> Result<()> {
    let spinner = ui::new_spinner("Fetching rates...");
    let outcome = engine.refresh_all(options).await;
    spinner.finish_and_clear();

    println!("{}", render_outcome(&outcome));
    engine.flush().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuySell, CostPriceSet, RateQuote, SourceId};
    use std::collections::BTreeMap;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&RateValue::Single(36.456)), "36.46");
        let table = BTreeMap::from([("EUR".to_string(), 0.92), ("GBP".to_string(), 0.79)]);
        assert_eq!(
            format_value(&RateValue::Table(table)),
            "EUR 0.9200, GBP 0.7900"
        );
        let pairs = BTreeMap::from([(
            "Wise".to_string(),
            BuySell {
                buy: 36.1,
                sell: 36.9,
            },
        )]);
        assert_eq!(format_value(&RateValue::Pairs(pairs)), "Wise 36.10/36.90");
    }

    #[test]
    fn test_render_outcome_lists_quotes_and_prices() {
        let quotes = BTreeMap::from([
            (
                SourceId::P2p,
                RateQuote::live(SourceId::P2p, RateValue::Single(1000.0)),
            ),
            (
                SourceId::Broker,
                RateQuote::fallback(
                    SourceId::Broker,
                    RateValue::Pairs(BTreeMap::from([(
                        "reference".to_string(),
                        BuySell {
                            buy: 36.2,
                            sell: 36.8,
                        },
                    )])),
                ),
            ),
        ]);
        let cost_prices: CostPriceSet =
            BTreeMap::from([("USD".to_string(), 1025.0), ("EUR".to_string(), 0.0)]);
        let outcome = RefreshOutcome {
            updated: true,
            quotes,
            cost_prices,
            previous_cost_prices: Some(BTreeMap::from([("USD".to_string(), 1000.0)])),
        };

        let rendered = render_outcome(&outcome);
        assert!(rendered.contains("p2p"));
        assert!(rendered.contains("1000.00"));
        assert!(rendered.contains("default"));
        assert!(rendered.contains("1025.00"));
        assert!(rendered.contains("+25.00"));
        assert!(rendered.contains("N/A"));
        assert!(!rendered.contains("No live data"));
    }
}
