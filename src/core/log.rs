//! Logging initialization
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. Logs go to stderr so rate tables on
/// stdout stay pipeable; long-running modes keep timestamps.
pub fn init_logging(verbose: bool, timestamps: bool) {
    let (level_filter, default_directive) = if verbose {
        (LevelFilter::DEBUG, "ratekeeper=debug")
    } else {
        (LevelFilter::OFF, "off")
    };
    let app_filter = Targets::new().with_target("ratekeeper", level_filter);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let fmt_layer = if timestamps {
        fmt_layer.compact().boxed()
    } else {
        fmt_layer.pretty().without_time().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(app_filter)
        .with(env_filter)
        .init();
}
