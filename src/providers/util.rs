use crate::core::{RateError, RateResult, SourceId, Usable};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs an async operation up to `max_attempts` times, one attempt at a time.
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `max_attempts`: Total number of runs, at least one
/// - `delay`: Pause between attempts, never after the last one
///
/// # Returns
/// The first usable result, or the error from the final attempt. A result
/// that fails [`Usable::check_usable`] counts as a failed attempt.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    max_attempts: usize,
    delay: Duration,
) -> RateResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RateResult<T>>,
    T: Usable,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match operation().await {
            Ok(val) => match val.check_usable() {
                Ok(()) => return Ok(val),
                Err(err) => err,
            },
            Err(err) => err,
        };
        if attempt >= max_attempts {
            return Err(err);
        }
        debug!(
            "Attempt {}/{} failed: {}. Retrying...",
            attempt, max_attempts, err
        );
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

pub(crate) fn client() -> reqwest::Client {
    // Builder only fails when the TLS backend cannot initialise
    reqwest::Client::builder()
        .user_agent("ratekeeper/1.0")
        .build()
        .unwrap_or_default()
}

pub(crate) fn transport_error(source_id: SourceId, err: reqwest::Error) -> RateError {
    RateError::network(source_id, err.to_string())
}

/// Reads a successful response body, mapping bad statuses to network errors.
pub(crate) async fn read_body(
    source_id: SourceId,
    response: reqwest::Response,
) -> RateResult<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(RateError::network(source_id, format!("HTTP error: {status}")));
    }
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(source_id, e))?;
    if body.trim().is_empty() {
        return Err(RateError::invalid(source_id, "empty response body"));
    }
    Ok(body)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    source_id: SourceId,
    body: &str,
) -> RateResult<T> {
    serde_json::from_str(body)
        .map_err(|e| RateError::invalid(source_id, format!("failed to parse response: {e}")))
}
