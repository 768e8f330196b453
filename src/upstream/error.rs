use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Classified failure of a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("NEYNAR_API_KEY is not set")]
    MissingApiKey,

    #[error("rate limited by upstream (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("upstream rejected request (status {status})")]
    Client { status: u16 },

    #[error("transient upstream failure: {0}")]
    Transient(String),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Configuration problems abort the whole aggregation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingApiKey)
    }

    /// Caller's plan tier does not cover the endpoint.
    pub fn requires_payment(&self) -> bool {
        matches!(self, Self::Client { status: 402 })
    }

    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "config",
            Self::RateLimited { .. } => "rate_limited",
            Self::Client { status: 402 } => "payment_required",
            Self::Client { .. } => "client_error",
            Self::Transient(_) => "transient",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Transient(err.to_string())
    }
}
