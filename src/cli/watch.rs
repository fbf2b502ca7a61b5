use super::{rates, ui};
use crate::engine::scheduler::PeriodicRefresh;
use crate::engine::{RateEngine, RefreshOptions};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

/// Refreshes on a timer and prints every outcome until Ctrl-C.
pub async fn run(engine: RateEngine, period: Duration, options: RefreshOptions) -> Result<()> {
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Refreshing every {}s, press Ctrl-C to stop",
                period.as_secs()
            ),
            ui::StyleType::Subtle
        )
    );

    let refresh = PeriodicRefresh::spawn(
        engine.clone(),
        period,
        // Forcing would bypass cache and cooldown on every tick
        RefreshOptions {
            force_refresh: false,
            ..options
        },
        |outcome| {
            println!("{}", rates::render_outcome(&outcome));
            ui::print_separator();
        },
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down periodic refresh");
    refresh.shutdown().await;
    engine.flush().await;
    Ok(())
}
