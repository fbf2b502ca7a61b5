pub mod cli;
pub mod core;
pub mod engine;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{Notifier, RateSource, SnapshotSink, SourceId, TriggerKind};
use crate::engine::throttle::ThrottleStore;
use crate::engine::{EngineContext, RateEngine, RefreshOptions, RetryPolicy, SourcePolicy};
use crate::providers::{BrokerProvider, ForexProvider, P2pProvider};
use crate::store::DiskStore;
use crate::store::memory::{MemoryHistory, MemoryThrottleStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Rates,
    Watch,
    Price { rate: f64 },
    History { limit: usize },
}

/// Flags that apply to every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub constrained: bool,
    pub force: bool,
}

/// A ready-to-use engine plus the history it writes to.
pub struct AppContext {
    pub engine: RateEngine,
    pub history: Arc<dyn SnapshotSink>,
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    options: RunOptions,
) -> Result<()> {
    info!("Rate keeper starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let context = build_context(&config, Arc::new(cli::ui::ConsoleNotifier)).await?;
    let refresh = RefreshOptions {
        force_refresh: options.force,
        constrained_client: options.constrained || config.constrained_client,
        trigger: TriggerKind::Refresh,
    };

    match command {
        AppCommand::Rates => cli::rates::run(&context.engine, refresh).await,
        AppCommand::Watch => {
            cli::watch::run(context.engine, config.refresh_interval(), refresh).await
        }
        AppCommand::Price { rate } => cli::price::run(&context.engine, rate).await,
        AppCommand::History { limit } => cli::history::run(context.history.as_ref(), limit).await,
    }
}

/// Wires providers, stores and policies from `config` into an engine and
/// restores last-known-good values from history.
pub async fn build_context(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<AppContext> {
    let (throttle_store, history) = match open_disk_stores(config) {
        Ok(stores) => stores,
        Err(e) => {
            warn!(error = %e, "Data directory unavailable, state will not survive restarts");
            (
                Arc::new(MemoryThrottleStore::new()) as Arc<dyn ThrottleStore>,
                Arc::new(MemoryHistory::new()) as Arc<dyn SnapshotSink>,
            )
        }
    };

    let sources: [Arc<dyn RateSource>; 3] = [
        Arc::new(P2pProvider::new(&config.providers.p2p)),
        Arc::new(ForexProvider::new(&config.providers.forex)),
        Arc::new(BrokerProvider::new(&config.providers.broker)),
    ];
    let mut builder = RateEngine::builder(EngineContext {
        throttle_store,
        notifier,
        history: Arc::clone(&history),
    })
    .margins(config.margins);
    for source in sources {
        let policy = source_policy(config, source.source_id());
        builder = builder.source(source, policy);
    }
    let engine = builder.build()?;

    match engine.seed_from_history().await {
        Ok(seeded) => debug!(seeded, "Restored last known good rates"),
        Err(e) => warn!(error = %e, "Could not restore rates from history"),
    }

    Ok(AppContext { engine, history })
}

fn open_disk_stores(config: &AppConfig) -> Result<(Arc<dyn ThrottleStore>, Arc<dyn SnapshotSink>)> {
    let store = DiskStore::open(&config.default_data_path()?)?;
    Ok((Arc::new(store.throttle_store()?), Arc::new(store.history()?)))
}

fn source_policy(config: &AppConfig, source: SourceId) -> SourcePolicy {
    let settings = config.sources.get(source);
    SourcePolicy {
        cache_ttl: settings.cache_ttl(),
        cooldown: settings.cooldown(),
        timeout: settings.timeout(),
        background_timeout: settings.background_timeout(),
        retry: settings.retry.map(|r| RetryPolicy {
            max_attempts: r.max_attempts,
            delay: Duration::from_millis(r.delay_ms),
        }),
        fallback: config.fallback.value_for(source),
    }
}
