use super::ui;
use crate::core::pricing::USD;
use crate::core::{Origin, SnapshotSink, SourceId};
use anyhow::{Context, Result};
use comfy_table::Cell;

pub async fn run(history: &dyn SnapshotSink, limit: usize) -> Result<()> {
    let snapshots = history
        .recent(limit)
        .await
        .context("Failed to read snapshot history")?;

    if snapshots.is_empty() {
        println!("No snapshots recorded yet. Run `ratekeeper rates` first.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Taken at"),
        ui::header_cell("Trigger"),
        ui::header_cell("P2P rate"),
        ui::header_cell("USD cost"),
        ui::header_cell("Live sources"),
    ]);
    for snapshot in &snapshots {
        let p2p_rate = snapshot
            .quotes
            .get(&SourceId::P2p)
            .and_then(|q| q.value.as_single())
            .unwrap_or(0.0);
        let usd_cost = snapshot.cost_prices.get(USD).copied().unwrap_or(0.0);
        let live = snapshot
            .quotes
            .values()
            .filter(|q| q.origin == Origin::Live)
            .map(|q| q.source.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            Cell::new(snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            Cell::new(snapshot.trigger.to_string()),
            ui::amount_cell(p2p_rate),
            ui::amount_cell(usd_cost),
            Cell::new(live),
        ]);
    }

    println!(
        "{}\n\n{table}",
        ui::style_text("Recent snapshots", ui::StyleType::Title)
    );
    Ok(())
}
