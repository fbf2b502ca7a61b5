use super::{RateEngine, RefreshOptions, RefreshOutcome};
use crate::core::TriggerKind;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Drives [`RateEngine::refresh_all`] on a fixed period until stopped.
///
/// The first refresh runs immediately. Dropping the handle stops the timer
/// after any refresh already in flight; [`PeriodicRefresh::shutdown`] also
/// waits for that to finish.
pub struct PeriodicRefresh {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicRefresh {
    pub fn spawn<F>(
        engine: RateEngine,
        period: Duration,
        options: RefreshOptions,
        on_refresh: F,
    ) -> Self
    where
        F: Fn(RefreshOutcome) + Send + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let options = RefreshOptions {
            trigger: TriggerKind::Auto,
            ..options
        };
        // tokio panics on a zero period
        let period = period.max(Duration::from_secs(1));

        let handle = tokio::spawn(async move {
            info!(?period, "Periodic refresh started");
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        let outcome = engine.refresh_all(options).await;
                        debug!(updated = outcome.updated, "Periodic refresh tick");
                        on_refresh(outcome);
                    }
                }
            }
            info!("Periodic refresh stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the timer and waits for the loop to exit.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicRefresh {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        BrokerQuote, BuySell, LogNotifier, RateResult, RateSource, RateValue, RawPayload,
        SourceId,
    };
    use crate::engine::{EngineContext, SourcePolicy};
    use crate::store::memory::{MemoryHistory, MemoryThrottleStore};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    struct Steady(SourceId);

    #[async_trait]
    impl RateSource for Steady {
        fn source_id(&self) -> SourceId {
            self.0
        }

        async fn fetch_live(&self) -> RateResult<RawPayload> {
            Ok(match self.0 {
                SourceId::P2p => RawPayload::Offers(vec![40.0]),
                SourceId::Forex => {
                    RawPayload::Rates(BTreeMap::from([("EUR".to_string(), 0.92)]))
                }
                SourceId::Broker => RawPayload::Quotes(vec![BrokerQuote {
                    name: "Wise".to_string(),
                    buy: 36.0,
                    sell: 37.0,
                }]),
            })
        }
    }

    fn engine() -> RateEngine {
        let mut builder = RateEngine::builder(EngineContext {
            throttle_store: Arc::new(MemoryThrottleStore::new()),
            notifier: Arc::new(LogNotifier),
            history: Arc::new(MemoryHistory::new()),
        });
        for id in SourceId::ALL {
            let fallback = match id {
                SourceId::P2p => RateValue::Single(36.5),
                SourceId::Forex => RateValue::Table(BTreeMap::from([("EUR".to_string(), 0.9)])),
                SourceId::Broker => RateValue::Pairs(BTreeMap::from([(
                    "reference".to_string(),
                    BuySell {
                        buy: 36.0,
                        sell: 37.0,
                    },
                )])),
            };
            builder = builder.source(
                Arc::new(Steady(id)),
                SourcePolicy {
                    cache_ttl: Duration::from_secs(30),
                    cooldown: Duration::from_secs(10),
                    timeout: Duration::from_secs(1),
                    background_timeout: Duration::from_millis(200),
                    retry: None,
                    fallback,
                },
            );
        }
        builder.build().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_shutdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let refresh = PeriodicRefresh::spawn(
            engine(),
            Duration::from_secs(60),
            RefreshOptions::default(),
            move |outcome| {
                assert_eq!(outcome.quotes.len(), 3);
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(refresh.is_running());

        // Ticks at 0s, 60s and 120s
        sleep(Duration::from_secs(150)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        refresh.shutdown().await;
        sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let refresh = PeriodicRefresh::spawn(
            engine(),
            Duration::from_secs(60),
            RefreshOptions::default(),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        sleep(Duration::from_secs(1)).await;
        drop(refresh);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
