//! Rate resolution pipeline: cache, cooldown, live fetch with retry, then
//! last-known-good and finally the hardcoded default.
//!
//! All mutable state lives in one [`RateEngine`] context object. Every write
//! to shared state replaces a whole value (a cache entry, an `Arc<RateQuote>`
//! or a cost price set) so concurrent readers never see a partial update.

pub mod fetcher;
pub mod scheduler;
pub mod throttle;

use crate::core::cache::ExpiringCache;
use crate::core::pricing::{self, CostPriceBook, CostPriceSet, MarginSettings};
use crate::core::{
    NoticeKind, Notifier, Origin, RateError, RateQuote, RateResult, RateSource, RateValue,
    Snapshot, SnapshotSink, SourceId, TriggerKind,
};
use crate::providers::util::with_retry;
use anyhow::{Result, anyhow};
use chrono::Utc;
use fetcher::SourceFetcher;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use throttle::{AttemptThrottle, ThrottleStore};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

/// Per-source timing and fallback rules.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub cache_ttl: Duration,
    pub cooldown: Duration,
    pub timeout: Duration,
    /// Short budget used for constrained clients and detached refreshes.
    pub background_timeout: Duration,
    pub retry: Option<RetryPolicy>,
    pub fallback: RateValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub force_refresh: bool,
    pub constrained_client: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    pub force_refresh: bool,
    pub constrained_client: bool,
    pub trigger: TriggerKind,
}

impl RefreshOptions {
    fn resolve(&self) -> ResolveOptions {
        ResolveOptions {
            force_refresh: self.force_refresh,
            constrained_client: self.constrained_client,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// At least one quote came from a live fetch.
    pub updated: bool,
    pub quotes: BTreeMap<SourceId, RateQuote>,
    pub cost_prices: CostPriceSet,
    pub previous_cost_prices: Option<CostPriceSet>,
}

impl RefreshOutcome {
    pub fn deltas(&self) -> BTreeMap<String, f64> {
        self.previous_cost_prices
            .as_ref()
            .map(|previous| pricing::price_deltas(&self.cost_prices, previous))
            .unwrap_or_default()
    }
}

struct SourceSlot {
    fetcher: SourceFetcher,
    policy: SourcePolicy,
    /// Bumped by every live attempt.
    generation: AtomicU64,
    /// Generation of the newest success written to cache and last known good.
    applied: AtomicU64,
    failing: AtomicBool,
}

struct EngineState {
    slots: HashMap<SourceId, SourceSlot>,
    cache: ExpiringCache<SourceId, RateQuote>,
    last_known_good: RwLock<HashMap<SourceId, Arc<RateQuote>>>,
    throttle: AttemptThrottle,
    notifier: Arc<dyn Notifier>,
    history: Arc<dyn SnapshotSink>,
    margins: RwLock<MarginSettings>,
    cost_prices: Mutex<CostPriceBook>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

/// Collaborators the engine talks to but does not own.
pub struct EngineContext {
    pub throttle_store: Arc<dyn ThrottleStore>,
    pub notifier: Arc<dyn Notifier>,
    pub history: Arc<dyn SnapshotSink>,
}

pub struct RateEngineBuilder {
    context: EngineContext,
    margins: MarginSettings,
    slots: HashMap<SourceId, SourceSlot>,
}

impl RateEngineBuilder {
    pub fn source(mut self, source: Arc<dyn RateSource>, policy: SourcePolicy) -> Self {
        let fetcher = SourceFetcher::new(source);
        self.slots.insert(
            fetcher.source_id(),
            SourceSlot {
                fetcher,
                policy,
                generation: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                failing: AtomicBool::new(false),
            },
        );
        self
    }

    pub fn margins(mut self, margins: MarginSettings) -> Self {
        self.margins = margins;
        self
    }

    /// Fails unless every [`SourceId`] has a source and a usable fallback.
    pub fn build(self) -> Result<RateEngine> {
        for id in SourceId::ALL {
            let slot = self
                .slots
                .get(&id)
                .ok_or_else(|| anyhow!("No source configured for {}", id))?;
            if !slot.policy.fallback.is_usable() {
                return Err(anyhow!("Fallback value for {} is not usable", id));
            }
        }
        self.margins.validate()?;

        Ok(RateEngine {
            state: Arc::new(EngineState {
                slots: self.slots,
                cache: ExpiringCache::new(),
                last_known_good: RwLock::new(HashMap::new()),
                throttle: AttemptThrottle::new(self.context.throttle_store),
                notifier: self.context.notifier,
                history: self.context.history,
                margins: RwLock::new(self.margins),
                cost_prices: Mutex::new(CostPriceBook::default()),
                pending_writes: Mutex::new(Vec::new()),
            }),
        })
    }
}

#[derive(Clone)]
pub struct RateEngine {
    state: Arc<EngineState>,
}

impl RateEngine {
    pub fn builder(context: EngineContext) -> RateEngineBuilder {
        RateEngineBuilder {
            context,
            margins: MarginSettings::default(),
            slots: HashMap::new(),
        }
    }

    /// Resolves one source. Never fails: the worst case is the hardcoded default.
    pub async fn resolve_rate(&self, source: SourceId, options: ResolveOptions) -> RateQuote {
        let state = &self.state;
        let policy = &state.slot(source).policy;

        if !options.force_refresh
            && let Some(cached) = state.cache.get(&source).await
        {
            return cached.with_origin(Origin::Cache);
        }

        let last_good = state.last_known_good(source).await;
        let may_attempt = state
            .throttle
            .should_attempt(source, policy.cooldown, options.force_refresh)
            .await;
        if !may_attempt && let Some(quote) = &last_good {
            debug!(source = %source, "Cooldown active, serving last known good");
            return quote.with_origin(Origin::LastKnownGood);
        }

        if options.constrained_client {
            if let Some(quote) = last_good {
                self.spawn_background_refresh(source);
                return quote.with_origin(Origin::LastKnownGood);
            }
            // Nothing to show yet: one short, unretried attempt
            return state
                .live_or_fallback(source, policy.background_timeout, None)
                .await;
        }

        state
            .live_or_fallback(source, policy.timeout, policy.retry)
            .await
    }

    /// Resolves every source and reprices from the result.
    pub async fn refresh_all(&self, options: RefreshOptions) -> RefreshOutcome {
        let resolve = options.resolve();
        let resolved = join_all(
            SourceId::ALL
                .iter()
                .map(|source| self.resolve_rate(*source, resolve)),
        )
        .await;
        let quotes: BTreeMap<SourceId, RateQuote> =
            resolved.into_iter().map(|q| (q.source, q)).collect();
        let updated = quotes.values().any(|q| q.origin == Origin::Live);

        let base_rate = quotes
            .get(&SourceId::P2p)
            .and_then(|q| q.value.as_single())
            .unwrap_or(0.0);
        let fx_rates = quotes
            .get(&SourceId::Forex)
            .and_then(|q| q.value.as_table())
            .cloned()
            .unwrap_or_default();
        let margins = *self.state.margins.read().await;
        let cost_prices = pricing::compute_cost_prices(base_rate, &fx_rates, &margins);
        let previous_cost_prices = self
            .state
            .cost_prices
            .lock()
            .await
            .replace(cost_prices.clone());

        if updated {
            self.persist_snapshot(Snapshot {
                taken_at: Utc::now(),
                trigger: options.trigger,
                quotes: quotes.clone(),
                cost_prices: cost_prices.clone(),
            })
            .await;
        }
        info!(
            updated,
            trigger = %options.trigger,
            base_rate,
            "Refresh complete"
        );

        RefreshOutcome {
            updated,
            quotes,
            cost_prices,
            previous_cost_prices,
        }
    }

    /// Prices a user-entered rate against the current forex table without
    /// touching cached state.
    pub async fn price_manual_rate(&self, base_rate: f64) -> RateResult<CostPriceSet> {
        let margins = *self.state.margins.read().await;
        margins.validate()?;
        if !(base_rate.is_finite() && base_rate > 0.0) {
            return Err(RateError::Validation(format!(
                "rate must be a positive number, got {base_rate}"
            )));
        }
        let forex = self
            .resolve_rate(SourceId::Forex, ResolveOptions::default())
            .await;
        let fx_rates = forex.value.as_table().cloned().unwrap_or_default();
        pricing::price_manual_rate(base_rate, &fx_rates, &margins)
    }

    pub async fn set_margins(&self, margins: MarginSettings) -> RateResult<()> {
        margins.validate()?;
        *self.state.margins.write().await = margins;
        Ok(())
    }

    pub async fn margins(&self) -> MarginSettings {
        *self.state.margins.read().await
    }

    pub async fn cost_prices(&self) -> CostPriceBook {
        self.state.cost_prices.lock().await.clone()
    }

    pub async fn last_known_good(&self, source: SourceId) -> Option<RateQuote> {
        self.state
            .last_known_good(source)
            .await
            .map(|q| q.as_ref().clone())
    }

    /// Restores last-known-good values from the most recent snapshot.
    /// Returns how many sources were seeded.
    pub async fn seed_from_history(&self) -> Result<usize> {
        let Some(snapshot) = self.state.history.latest().await? else {
            return Ok(0);
        };
        let mut seeded = 0;
        for quote in snapshot.quotes.into_values() {
            // Defaults were never fetched; they must not masquerade as good data
            if quote.origin == Origin::Default || !quote.value.is_usable() {
                continue;
            }
            if self.state.store_last_known_good(quote).await {
                seeded += 1;
            }
        }
        debug!(seeded, taken_at = %snapshot.taken_at, "Seeded last known good from history");
        Ok(seeded)
    }

    fn spawn_background_refresh(&self, source: SourceId) {
        let state = Arc::clone(&self.state);
        debug!(source = %source, "Spawning background refresh");
        tokio::spawn(async move {
            let timeout = state.slot(source).policy.background_timeout;
            if let Err(err) = state.fetch_live(source, timeout, None).await {
                state.record_failure(source, &err);
                state.notifier.notify(
                    NoticeKind::Warning,
                    &format!("Background refresh of {source} failed: {err}"),
                );
            }
        });
    }

    /// Waits for snapshot writes still in flight. Call before the runtime
    /// shuts down so short-lived processes keep their history.
    pub async fn flush(&self) {
        let pending: Vec<_> = self.state.pending_writes.lock().await.drain(..).collect();
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Snapshot write task failed");
            }
        }
    }

    async fn persist_snapshot(&self, snapshot: Snapshot) {
        let history = Arc::clone(&self.state.history);
        let handle = tokio::spawn(async move {
            if let Err(e) = history.persist(&snapshot).await {
                warn!(error = %e, "Failed to persist snapshot");
            }
        });
        let mut pending = self.state.pending_writes.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

impl EngineState {
    fn slot(&self, source: SourceId) -> &SourceSlot {
        // `RateEngineBuilder::build` guarantees a slot for every source id
        &self.slots[&source]
    }

    async fn last_known_good(&self, source: SourceId) -> Option<Arc<RateQuote>> {
        self.last_known_good.read().await.get(&source).cloned()
    }

    /// Swaps in `quote` unless an equally new or newer one is already held.
    async fn store_last_known_good(&self, quote: RateQuote) -> bool {
        let mut cells = self.last_known_good.write().await;
        match cells.get(&quote.source) {
            Some(existing) if existing.fetched_at >= quote.fetched_at => false,
            _ => {
                cells.insert(quote.source, Arc::new(quote));
                true
            }
        }
    }

    async fn live_or_fallback(
        &self,
        source: SourceId,
        timeout: Duration,
        retry: Option<RetryPolicy>,
    ) -> RateQuote {
        match self.fetch_live(source, timeout, retry).await {
            Ok(quote) => quote,
            Err(err) => self.fallback_after_failure(source, &err).await,
        }
    }

    /// Performs the live attempt(s) and applies a successful result.
    async fn fetch_live(
        &self,
        source: SourceId,
        timeout: Duration,
        retry: Option<RetryPolicy>,
    ) -> RateResult<RateQuote> {
        let slot = self.slot(source);
        let generation = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let throttle = &self.throttle;
        let fetcher = &slot.fetcher;
        let attempt = move || async move {
            throttle.record_attempt(source, Utc::now()).await;
            fetcher.fetch(timeout).await
        };
        let quote = match retry {
            Some(policy) => with_retry(attempt, policy.max_attempts, policy.delay).await?,
            None => attempt().await?,
        };

        // Failed attempts never advance `applied`, so only a newer success wins
        if slot.applied.fetch_max(generation, Ordering::SeqCst) > generation {
            debug!(source = %source, generation, "Discarding superseded live result");
            return Ok(quote);
        }
        self.cache
            .set(source, quote.clone(), slot.policy.cache_ttl)
            .await;
        self.store_last_known_good(quote.clone()).await;
        if slot.failing.swap(false, Ordering::SeqCst) {
            self.notifier.notify(
                NoticeKind::Success,
                &format!("Live {source} rate restored"),
            );
        }
        Ok(quote)
    }

    fn record_failure(&self, source: SourceId, err: &RateError) {
        warn!(source = %source, error = %err, "Live fetch failed");
        self.slot(source).failing.store(true, Ordering::SeqCst);
    }

    async fn fallback_after_failure(&self, source: SourceId, err: &RateError) -> RateQuote {
        self.record_failure(source, err);
        if let Some(quote) = self.last_known_good(source).await {
            self.notifier.notify(
                NoticeKind::Warning,
                &format!(
                    "Live {source} rate unavailable ({err}); showing value from {}",
                    quote.fetched_at.format("%Y-%m-%d %H:%M UTC")
                ),
            );
            return quote.with_origin(Origin::LastKnownGood);
        }
        self.notifier.notify(
            NoticeKind::Error,
            &format!("Live {source} rate unavailable ({err}); showing default value"),
        );
        RateQuote::fallback(source, self.slot(source).policy.fallback.clone())
    }
}
