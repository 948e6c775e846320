//! `TmdbFetch` trait definition.
#![allow(clippy::future_not_send)]

use serde_json::Value;

use super::cache::QueryParams;
use super::error::GatewayError;

/// Cached, rate-limited TMDB fetch.
///
/// Abstracts the gateway for mock substitution in callers' tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(TmdbFetch: Send)]
pub trait LocalTmdbFetch {
    /// Fetches `endpoint` with `params`, serving from cache when fresh.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Configuration`] if no API keys are configured.
    /// - [`GatewayError::Upstream`] on a non-retryable HTTP error.
    /// - [`GatewayError::Exhausted`] when retries run out and the
    ///   endpoint has no placeholder.
    /// - [`GatewayError::Request`] on URL, request, or decode failures.
    async fn fetch(&self, endpoint: &str, params: &QueryParams) -> Result<Value, GatewayError>;
}
