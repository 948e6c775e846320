//! `Gateway` - cached, key-rotating, retrying TMDB client.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use super::api::LocalTmdbFetch;
use super::cache::{DEFAULT_CAPACITY, DEFAULT_TTL, QueryParams, ResponseCache, cache_key};
use super::error::{AttemptError, GatewayError};
use super::keys::KeyRotator;
use super::placeholder::placeholder_for;
use super::rate_limiter::TmdbRateLimiter;
use super::retry::{RetryPolicy, is_retryable_status, is_retryable_transport};
use super::types::{CacheStatus, GatewayStatus, TmdbErrorResponse};

/// Default base URL for TMDB API v3.
const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3/";

/// Default response language.
const DEFAULT_LANGUAGE: &str = "en-US";

/// Default per-attempt timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the connectivity check.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint used by the connectivity check.
const CONNECTIVITY_ENDPOINT: &str = "configuration";

/// Default User-Agent.
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Caching, rate-limited, key-rotating fetch layer in front of TMDB.
///
/// One instance owns the response cache, the key cursor and the
/// last-dispatch clock; share it between callers with `Arc<Gateway>`.
#[derive(Debug)]
pub struct Gateway {
    /// HTTP client.
    http_client: Client,
    /// Base URL for API requests (always ends with `/`).
    base_url: Url,
    /// Default `language` query parameter.
    language: String,
    /// Per-attempt timeout.
    timeout: Duration,
    /// API key pool.
    keys: KeyRotator,
    /// Response cache.
    cache: ResponseCache,
    /// Pacing gate, held across the pacing sleep.
    rate_limiter: Mutex<TmdbRateLimiter>,
    /// Retry budget and backoff.
    retry: RetryPolicy,
}

/// Builder for `Gateway`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct GatewayBuilder {
    base_url: Option<Url>,
    api_keys: Vec<String>,
    user_agent: Option<String>,
    language: Option<String>,
    timeout: Option<Duration>,
    min_interval: Option<Duration>,
    cache_ttl: Option<Duration>,
    cache_capacity: Option<usize>,
    retry: RetryPolicy,
}

impl GatewayBuilder {
    /// Creates a new builder.
    fn new() -> Self {
        Self {
            base_url: None,
            api_keys: Vec::new(),
            user_agent: None,
            language: None,
            timeout: None,
            min_interval: None,
            cache_ttl: None,
            cache_capacity: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the API key pool, in rotation order.
    #[must_use]
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the User-Agent (default: crate name and version).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the default `language` parameter (default: `en-US`).
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the per-attempt timeout (default: 10s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the minimum spacing between upstream requests (default: 100ms).
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Sets the cache time-to-live (default: 30 minutes).
    #[must_use]
    pub const fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the cache capacity (default: 1000 entries).
    #[must_use]
    pub const fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Sets the number of attempts per fetch (default: 6).
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    /// Sets the backoff base delay and multiplier (default: 3s × 1.5).
    #[must_use]
    pub const fn backoff(mut self, base: Duration, multiplier: f64) -> Self {
        self.retry.base_delay = base;
        self.retry.multiplier = multiplier;
        self
    }

    /// Builds the gateway.
    ///
    /// An empty key pool is accepted here; fetches fail with
    /// [`GatewayError::Configuration`] until keys are provided.
    ///
    /// # Errors
    ///
    /// - `max_attempts` is zero.
    /// - The backoff multiplier is not a positive finite number.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<Gateway> {
        if self.retry.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier > 0.0) {
            bail!(
                "backoff multiplier must be a positive number, got {}",
                self.retry.multiplier
            );
        }

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        let keys = KeyRotator::new(self.api_keys);
        if keys.is_empty() {
            tracing::warn!("No TMDB API keys configured; fetches will fail until TMDB_API_KEYS is set");
        }

        let cache = ResponseCache::new(
            self.cache_ttl.unwrap_or(DEFAULT_TTL),
            self.cache_capacity.unwrap_or(DEFAULT_CAPACITY),
        );

        let rate_limiter = self
            .min_interval
            .map_or_else(TmdbRateLimiter::default, TmdbRateLimiter::new);

        Ok(Gateway {
            http_client,
            base_url: with_trailing_slash(base_url),
            language: self
                .language
                .unwrap_or_else(|| String::from(DEFAULT_LANGUAGE)),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            keys,
            cache,
            rate_limiter: Mutex::new(rate_limiter),
            retry: self.retry,
        })
    }
}

/// Ensures `Url::join` appends endpoints instead of replacing the last segment.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl Gateway {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Shared response cache, for callers memoizing derived payloads.
    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Key pool and cache occupancy.
    #[must_use]
    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            api_keys: self.keys.status(),
            cache: CacheStatus {
                size: self.cache.len(),
                capacity: self.cache.capacity(),
                ttl_secs: self.cache.ttl().as_secs(),
            },
        }
    }

    /// Requests `GET configuration` once with a rotated key.
    ///
    /// Bypasses the cache and the retry loop.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] without keys, otherwise
    /// any failure of the single attempt.
    #[instrument(skip_all)]
    pub async fn check_connectivity(&self) -> Result<Value, GatewayError> {
        let (_, api_key) = self.keys.next_key()?;
        let url = self.endpoint_url(CONNECTIVITY_ENDPOINT)?;
        self.rate_limiter.lock().await.wait().await;

        match self
            .attempt(
                CONNECTIVITY_ENDPOINT,
                &url,
                api_key,
                &QueryParams::new(),
                CONNECTIVITY_TIMEOUT,
            )
            .await
        {
            Ok(payload) => {
                tracing::info!(keys = self.keys.len(), "TMDB API is accessible");
                Ok(payload)
            }
            Err(AttemptError::Terminal(err)) => Err(err),
            Err(AttemptError::Retryable(reason)) => Err(GatewayError::Request(anyhow::anyhow!(
                "TMDB API is not accessible: {reason}"
            ))),
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, GatewayError> {
        let path = endpoint.trim_start_matches('/');
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("failed to join URL path: {path}"))?;
        Ok(url)
    }

    /// Sends one GET and classifies the outcome.
    #[instrument(skip_all)]
    async fn attempt(
        &self,
        endpoint: &str,
        url: &Url,
        api_key: &str,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<Value, AttemptError> {
        let mut query: BTreeMap<&str, &str> = BTreeMap::new();
        query.insert("api_key", api_key);
        query.insert("language", self.language.as_str());
        for (name, value) in params {
            query.insert(name.as_str(), value.as_str());
        }

        let request = self
            .http_client
            .get(url.clone())
            .query(&query)
            .timeout(timeout)
            .build()
            .map_err(|err| {
                AttemptError::Terminal(GatewayError::Request(
                    anyhow::Error::new(err.without_url())
                        .context(format!("failed to build request: {endpoint}")),
                ))
            })?;

        tracing::debug!(path = url.path(), "TMDB API request");

        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(err) if is_retryable_transport(&err) => {
                return Err(AttemptError::Retryable(format!(
                    "connection error: {}",
                    err.without_url()
                )));
            }
            Err(err) => {
                return Err(AttemptError::Terminal(GatewayError::Request(
                    anyhow::Error::new(err.without_url())
                        .context(format!("request failed: {endpoint}")),
                )));
            }
        };

        let status = response.status();

        if is_retryable_status(status) {
            return Err(AttemptError::Retryable(format!("HTTP {status}")));
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to read body>"));
            let message = serde_json::from_str::<TmdbErrorResponse>(&body).map_or(
                body,
                |error_response| {
                    format!(
                        "code={}, message={}",
                        error_response.status_code, error_response.status_message
                    )
                },
            );
            return Err(AttemptError::Terminal(GatewayError::Upstream {
                endpoint: String::from(endpoint),
                status,
                message,
            }));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) if is_retryable_transport(&err) => {
                return Err(AttemptError::Retryable(format!(
                    "connection error while reading body: {}",
                    err.without_url()
                )));
            }
            Err(err) => {
                return Err(AttemptError::Terminal(GatewayError::Request(
                    anyhow::Error::new(err.without_url())
                        .context(format!("failed to read response body: {endpoint}")),
                )));
            }
        };

        serde_json::from_str(&body).map_err(|err| {
            AttemptError::Terminal(GatewayError::Request(
                anyhow::Error::new(err).context(format!("failed to decode JSON response: {endpoint}")),
            ))
        })
    }
}

impl LocalTmdbFetch for Gateway {
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    async fn fetch(&self, endpoint: &str, params: &QueryParams) -> Result<Value, GatewayError> {
        let key = cache_key(endpoint, params);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let url = self.endpoint_url(endpoint)?;
        let max_attempts = self.retry.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let (key_index, api_key) = self.keys.next_key()?;
            self.rate_limiter.lock().await.wait().await;

            tracing::info!(
                attempt,
                max_attempts,
                key_index = key_index.saturating_add(1),
                "TMDB API attempt"
            );

            match self
                .attempt(endpoint, &url, api_key, params, self.timeout)
                .await
            {
                Ok(payload) => {
                    tracing::info!(attempt, "TMDB API success");
                    self.cache.insert(key, payload.clone());
                    return Ok(payload);
                }
                Err(AttemptError::Terminal(err)) => {
                    tracing::warn!(attempt, error = %err, "TMDB API request failed (not retryable)");
                    return Err(err);
                }
                Err(AttemptError::Retryable(reason)) => {
                    if attempt < max_attempts {
                        let delay = self.retry.delay_after(attempt);
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            reason = %reason,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "TMDB API attempt failed. Retrying..."
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = reason;
                }
            }
        }

        if let Some(placeholder) = placeholder_for(endpoint) {
            tracing::warn!(
                attempts = max_attempts,
                last_error = %last_error,
                "TMDB API unavailable; returning placeholder data"
            );
            self.cache.insert(key, placeholder.clone());
            return Ok(placeholder);
        }

        tracing::error!(
            attempts = max_attempts,
            last_error = %last_error,
            "TMDB API failed and no placeholder is registered"
        );
        Err(GatewayError::Exhausted {
            endpoint: String::from(endpoint),
            attempts: max_attempts,
            last_error,
        })
    }
}
