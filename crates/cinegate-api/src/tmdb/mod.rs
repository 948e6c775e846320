//! TMDB gateway module.
//!
//! Wraps TMDB API v3 behind a response cache, round-robin API key
//! rotation, a pacing gate, and a retry loop that falls back to
//! placeholder data for listing endpoints.

mod api;
mod cache;
mod client;
mod error;
mod keys;
mod placeholder;
mod rate_limiter;
mod retry;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalTmdbFetch, TmdbFetch};
pub use cache::{DEFAULT_CAPACITY, DEFAULT_TTL, QueryParams, ResponseCache, cache_key};
pub use client::{Gateway, GatewayBuilder};
pub use error::GatewayError;
pub use keys::{KeyPoolStatus, KeyRotator};
pub use placeholder::{PlaceholderKind, listing_endpoints, placeholder_for, registered_endpoints};
#[allow(clippy::module_name_repetitions)]
pub use rate_limiter::{DEFAULT_MIN_INTERVAL, TmdbRateLimiter};
pub use retry::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_MAX_ATTEMPTS, RetryPolicy,
};
pub use types::{CacheStatus, GatewayStatus};
