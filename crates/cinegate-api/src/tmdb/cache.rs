//! TTL response cache with a FIFO capacity cap.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use url::form_urlencoded;

/// Default time-to-live for cached responses (30 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Default maximum number of cached responses.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Query parameters passed by callers. Ordered so cache keys are canonical.
pub type QueryParams = BTreeMap<String, String>;

/// Builds the cache key for an endpoint and its query parameters.
///
/// The leading `/` of the endpoint is ignored and parameters are
/// form-encoded in name order, so `{"b", "a"}` and `{"a", "b"}` map to
/// the same key.
#[must_use]
pub fn cache_key(endpoint: &str, params: &QueryParams) -> String {
    let endpoint = endpoint.trim_start_matches('/');
    if params.is_empty() {
        return endpoint.to_owned();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    format!("{endpoint}?{query}")
}

#[derive(Debug)]
struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Memoizes upstream JSON responses.
///
/// Entries expire `ttl` after they were stored and are dropped lazily on
/// the next lookup. When a new key would push the store past `capacity`,
/// the oldest-inserted entry is evicted; reads never change that order.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Entry time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns the cached payload if present and younger than the TTL.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    /// Stores `payload` under `key` with the current time.
    pub fn insert(&self, key: impl Into<String>, payload: Value) {
        self.insert_at(key.into(), payload, Instant::now());
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let mut state = self.lock();
        let entry = state.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            tracing::debug!(key, "Cache hit");
            return Some(entry.payload.clone());
        }
        state.remove(key);
        tracing::debug!(key, "Cache entry expired");
        None
    }

    pub(crate) fn insert_at(&self, key: String, payload: Value, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        if state.entries.contains_key(&key) {
            state.order.retain(|k| k != &key);
        } else if state.entries.len() >= self.capacity
            && let Some(oldest) = state.order.pop_front()
        {
            state.entries.remove(&oldest);
            tracing::debug!(key = %oldest, "Cache evicted oldest entry");
        }
        state.order.push_back(key.clone());
        state.entries.insert(
            key.clone(),
            CacheEntry {
                payload,
                stored_at: now,
            },
        );
        tracing::debug!(key = %key, size = state.entries.len(), "Cache set");
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
