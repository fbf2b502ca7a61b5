use super::ui;
use crate::core::CostPriceSet;
use crate::core::pricing::USD;
use crate::engine::RateEngine;
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn render_prices(base_rate: f64, prices: &CostPriceSet) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Cost price")]);
    let ordered = prices
        .get_key_value(USD)
        .into_iter()
        .chain(prices.iter().filter(|(c, _)| c.as_str() != USD));
    for (currency, price) in ordered {
        table.add_row(vec![Cell::new(currency), ui::amount_cell(*price)]);
    }

    format!(
        "Manual rate: {}\n\n{}",
        ui::style_text(&format!("{base_rate:.2}"), ui::StyleType::TotalValue),
        table
    )
}

pub async fn run(engine: &RateEngine, base_rate: f64) -> Result<()> {
    let prices = engine
        .price_manual_rate(base_rate)
        .await
        .context("Cannot price manual rate")?;
    println!("{}", render_prices(base_rate, &prices));
    Ok(())
}
