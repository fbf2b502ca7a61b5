use ratekeeper::core::config::AppConfig;
use ratekeeper::core::{LogNotifier, Origin, RateValue, SnapshotSink, SourceId, TriggerKind};
use ratekeeper::engine::RefreshOptions;
use std::fs;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// One server answering for all three upstreams.
    pub async fn create_upstreams() -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/p2p/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [{"adv": {"price": "990.00"}}, {"adv": {"price": "1010.00"}}]}"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/latest/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"result": "success", "conversion_rates": {"USD": 1, "EUR": 0.92, "GBP": 0.79}}"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rates"))
            .and(query_param("from", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"providers": [{"name": "Wise", "buy": 36.1, "sell": 36.9}]}"#,
            ))
            .mount(&mock_server)
            .await;

        mock_server
    }

    /// Writes a config pointing every provider at `base_url`.
    pub fn write_config(base_url: &str, data_dir: &std::path::Path) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let config_content = format!(
            r#"
providers:
  p2p:
    base_url: "{base_url}"
  forex:
    base_url: "{base_url}"
    currencies: ["EUR", "GBP"]
  broker:
    base_url: "{base_url}"
sources:
  p2p:
    cache_ttl_secs: 60
    cooldown_secs: 30
    timeout_ms: 2000
    background_timeout_ms: 500
data_path: "{}"
"#,
            data_dir.display()
        );
        std::fs::write(config_file.path(), config_content).expect("Failed to write config file");
        config_file
    }
}

fn setup(base_url: &str) -> (NamedTempFile, TempDir) {
    let data_dir = TempDir::new().expect("Failed to create data dir");
    let config_file = test_utils::write_config(base_url, data_dir.path());
    (config_file, data_dir)
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mocks() {
    let mock_server = test_utils::create_upstreams().await;
    let (config_file, _data_dir) = setup(&mock_server.uri());

    let result = ratekeeper::run_command(
        ratekeeper::AppCommand::Rates,
        Some(config_file.path().to_str().unwrap()),
        ratekeeper::RunOptions::default(),
    )
    .await;
    assert!(
        result.is_ok(),
        "Rates command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_refresh_prices_and_records_history() {
    let mock_server = test_utils::create_upstreams().await;
    let (config_file, _data_dir) = setup(&mock_server.uri());
    let config = AppConfig::load_from_path(config_file.path()).unwrap();

    let context = ratekeeper::build_context(&config, Arc::new(LogNotifier))
        .await
        .unwrap();
    let outcome = context
        .engine
        .refresh_all(RefreshOptions {
            trigger: TriggerKind::Refresh,
            ..RefreshOptions::default()
        })
        .await;
    context.engine.flush().await;
    info!(?outcome.cost_prices, "Refresh finished");

    assert!(outcome.updated);
    assert!(outcome.quotes.values().all(|q| q.origin == Origin::Live));
    assert_eq!(
        outcome.quotes[&SourceId::P2p].value,
        RateValue::Single(1000.0)
    );
    assert!((outcome.cost_prices["USD"] - 1025.0).abs() < 1e-9);
    assert!((outcome.cost_prices["EUR"] - 1000.0 * 0.999 / 0.92 * 1.03).abs() < 1e-9);
    assert_eq!(outcome.cost_prices.len(), 3);

    let snapshots = context.history.recent(10).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].trigger, TriggerKind::Refresh);
    assert_eq!(snapshots[0].cost_prices, outcome.cost_prices);

    // Served from cache the second time; nothing new is recorded
    let again = context
        .engine
        .refresh_all(RefreshOptions::default())
        .await;
    context.engine.flush().await;
    assert!(!again.updated);
    assert_eq!(context.history.recent(10).await.unwrap().len(), 1);

    let result = ratekeeper::cli::history::run(context.history.as_ref(), 5).await;
    assert!(result.is_ok());
}

#[test_log::test(tokio::test)]
async fn test_outage_serves_defaults_without_history() {
    // No mocks mounted: every upstream answers 404
    let mock_server = wiremock::MockServer::start().await;
    let (config_file, _data_dir) = setup(&mock_server.uri());
    let config = AppConfig::load_from_path(config_file.path()).unwrap();

    let context = ratekeeper::build_context(&config, Arc::new(LogNotifier))
        .await
        .unwrap();
    let outcome = context.engine.refresh_all(RefreshOptions::default()).await;
    context.engine.flush().await;

    assert!(!outcome.updated);
    for id in SourceId::ALL {
        let quote = &outcome.quotes[&id];
        assert_eq!(quote.origin, Origin::Default);
        assert_eq!(quote.value, config.fallback.value_for(id));
    }
    assert!((outcome.cost_prices["USD"] - 36.5 * 1.025).abs() < 1e-9);
    assert!(context.history.latest().await.unwrap().is_none());
}

#[test_log::test(tokio::test)]
async fn test_price_command_validates_input() {
    let mock_server = test_utils::create_upstreams().await;
    let (config_file, _data_dir) = setup(&mock_server.uri());
    let config_path = config_file.path().to_str().unwrap();

    let err = ratekeeper::run_command(
        ratekeeper::AppCommand::Price { rate: 0.0 },
        Some(config_path),
        ratekeeper::RunOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Cannot price manual rate"));

    let result = ratekeeper::run_command(
        ratekeeper::AppCommand::Price { rate: 1000.0 },
        Some(config_path),
        ratekeeper::RunOptions::default(),
    )
    .await;
    assert!(result.is_ok(), "Price command failed: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_history_command_with_empty_store() {
    let mock_server = wiremock::MockServer::start().await;
    let (config_file, _data_dir) = setup(&mock_server.uri());

    let result = ratekeeper::run_command(
        ratekeeper::AppCommand::History { limit: 5 },
        Some(config_file.path().to_str().unwrap()),
        ratekeeper::RunOptions::default(),
    )
    .await;
    assert!(result.is_ok(), "History command failed: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_invalid_margins_are_rejected() {
    let config_file = NamedTempFile::new().unwrap();
    fs::write(
        config_file.path(),
        "margins:\n  usd_margin_percent: -1.0\n  other_currencies_margin_percent: 3.0\n",
    )
    .unwrap();

    let err = ratekeeper::run_command(
        ratekeeper::AppCommand::Rates,
        Some(config_file.path().to_str().unwrap()),
        ratekeeper::RunOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Invalid margins"));
}
