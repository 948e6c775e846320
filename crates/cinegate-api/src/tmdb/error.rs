//! Gateway error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by [`Gateway::fetch`](super::Gateway).
///
/// Transient upstream failures (429, 5xx, timeouts, connection resets)
/// are absorbed by the retry loop and never appear here directly.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum GatewayError {
    /// No API keys are configured.
    #[error("no TMDB API keys configured; set TMDB_API_KEYS")]
    Configuration,

    /// Non-retryable upstream response (4xx other than 429).
    #[error("TMDB API error (HTTP {status}) for {endpoint}: {message}")]
    Upstream {
        /// Requested endpoint.
        endpoint: String,
        /// HTTP status returned by the upstream.
        status: StatusCode,
        /// Upstream error message.
        message: String,
    },

    /// All attempts failed and the endpoint has no placeholder.
    #[error("TMDB API failed after {attempts} attempts for {endpoint}: {last_error}")]
    Exhausted {
        /// Requested endpoint.
        endpoint: String,
        /// Number of attempts made.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// Local failure building the request or decoding the response.
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl GatewayError {
    /// Returns the upstream HTTP status if this is an [`Upstream`](Self::Upstream) error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of a single failed attempt inside the retry loop.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// Worth another attempt with a fresh key.
    Retryable(String),
    /// Stop immediately and surface to the caller.
    Terminal(GatewayError),
}
