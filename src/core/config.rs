use crate::core::pricing::MarginSettings;
use crate::core::quote::{BuySell, RateValue, SourceId};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct P2pProviderConfig {
    pub base_url: String,
    pub asset: String,
    pub fiat: String,
    pub trade_type: String,
    /// Number of offers requested and averaged into one rate.
    pub rows: usize,
}

impl Default for P2pProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            asset: "USDT".to_string(),
            fiat: "VES".to_string(),
            trade_type: "BUY".to_string(),
            rows: 5,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ForexProviderConfig {
    pub base_url: String,
    /// Restricts the forex table; empty keeps every currency returned.
    pub currencies: Vec<String>,
}

impl Default for ForexProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787/forex".to_string(),
            currencies: vec!["EUR".to_string(), "GBP".to_string(), "COP".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BrokerProviderConfig {
    pub base_url: String,
    pub fiat: String,
}

impl Default for BrokerProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787/broker".to_string(),
            fiat: "VES".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub p2p: P2pProviderConfig,
    pub forex: ForexProviderConfig,
    pub broker: BrokerProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SourceSettings {
    pub cache_ttl_secs: u64,
    pub cooldown_secs: u64,
    pub timeout_ms: u64,
    /// Budget for constrained clients and detached refreshes.
    pub background_timeout_ms: u64,
    #[serde(default)]
    pub retry: Option<RetrySettings>,
}

impl SourceSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn background_timeout(&self) -> Duration {
        Duration::from_millis(self.background_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    pub p2p: SourceSettings,
    pub forex: SourceSettings,
    pub broker: SourceSettings,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            p2p: SourceSettings {
                cache_ttl_secs: 60,
                cooldown_secs: 30,
                timeout_ms: 8_000,
                background_timeout_ms: 3_000,
                retry: Some(RetrySettings {
                    max_attempts: 3,
                    delay_ms: 1_000,
                }),
            },
            forex: SourceSettings {
                cache_ttl_secs: 3_600,
                cooldown_secs: 300,
                timeout_ms: 5_000,
                background_timeout_ms: 2_500,
                retry: None,
            },
            broker: SourceSettings {
                cache_ttl_secs: 300,
                cooldown_secs: 60,
                timeout_ms: 5_000,
                background_timeout_ms: 2_500,
                retry: None,
            },
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, source: SourceId) -> &SourceSettings {
        match source {
            SourceId::P2p => &self.p2p,
            SourceId::Forex => &self.forex,
            SourceId::Broker => &self.broker,
        }
    }
}

/// Values served when no live or last-known-good rate exists.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FallbackConfig {
    pub p2p_rate: f64,
    pub forex_rates: BTreeMap<String, f64>,
    pub broker_quotes: BTreeMap<String, BuySell>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            p2p_rate: 36.5,
            forex_rates: BTreeMap::from([
                ("EUR".to_string(), 0.92),
                ("GBP".to_string(), 0.79),
                ("COP".to_string(), 3_900.0),
            ]),
            broker_quotes: BTreeMap::from([(
                "reference".to_string(),
                BuySell {
                    buy: 36.2,
                    sell: 36.8,
                },
            )]),
        }
    }
}

impl FallbackConfig {
    pub fn value_for(&self, source: SourceId) -> RateValue {
        match source {
            SourceId::P2p => RateValue::Single(self.p2p_rate),
            SourceId::Forex => RateValue::Table(self.forex_rates.clone()),
            SourceId::Broker => RateValue::Pairs(self.broker_quotes.clone()),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub margins: MarginSettings,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub constrained_client: bool,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            sources: SourcesConfig::default(),
            fallback: FallbackConfig::default(),
            margins: MarginSettings::default(),
            refresh_interval_secs: default_refresh_interval_secs(),
            constrained_client: false,
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        // An empty document is valid and means "all defaults"
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .margins
            .validate()
            .with_context(|| format!("Invalid margins in {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}
