//! Rate engine error types.

use crate::core::quote::SourceId;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while obtaining or pricing a rate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// Upstream did not answer within the allotted window.
    #[error("{source_id} did not respond within {timeout:?}")]
    Timeout { source_id: SourceId, timeout: Duration },

    /// Transport-level failure (connection, TLS, non-success status).
    #[error("network error from {source_id}: {message}")]
    Network { source_id: SourceId, message: String },

    /// Payload was well-formed but carried no usable rate values.
    #[error("invalid response from {source_id}: {reason}")]
    InvalidResponse { source_id: SourceId, reason: String },

    /// Caller supplied a rate or margin that cannot be priced.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl RateError {
    pub fn network(source_id: SourceId, message: impl Into<String>) -> Self {
        RateError::Network {
            source_id,
            message: message.into(),
        }
    }

    pub fn invalid(source_id: SourceId, reason: impl Into<String>) -> Self {
        RateError::InvalidResponse {
            source_id,
            reason: reason.into(),
        }
    }
}

/// Result type for rate operations.
pub type RateResult<T> = Result<T, RateError>;
