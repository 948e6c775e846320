//! Round-robin API key rotation.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use super::error::GatewayError;

/// Number of leading key characters shown in logs.
const MASK_PREFIX_LEN: usize = 8;

/// Snapshot of the key pool, as reported by the health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPoolStatus {
    /// Number of configured keys.
    pub total: usize,
    /// Index of the key the next request will use.
    pub current_index: usize,
    /// Whether at least one key is configured.
    pub configured: bool,
}

/// Distributes requests evenly across a fixed pool of API keys.
///
/// The cursor advances on every call, wrapping modulo the pool size.
/// An empty pool is accepted at construction and only rejected when a
/// key is actually requested.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    /// Creates a rotator, trimming keys and dropping blank entries.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_owned())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of keys in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the key at the cursor and advances it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the pool is empty.
    pub fn next_key(&self) -> Result<(usize, &str), GatewayError> {
        let len = self.keys.len();
        if len == 0 {
            return Err(GatewayError::Configuration);
        }
        let advance = |i: usize| Some(i.checked_add(1).map_or(0, |n| n % len));
        // The closure never returns `None`, so both arms carry the previous cursor.
        let index = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, advance)
        {
            Ok(prev) | Err(prev) => prev % len,
        };
        let key = self
            .keys
            .get(index)
            .ok_or(GatewayError::Configuration)?;
        tracing::debug!(
            key_index = index.saturating_add(1),
            total = len,
            key = %mask_key(key),
            "Using TMDB API key"
        );
        Ok((index, key.as_str()))
    }

    /// Reports pool size and cursor position.
    #[must_use]
    pub fn status(&self) -> KeyPoolStatus {
        KeyPoolStatus {
            total: self.keys.len(),
            current_index: self.cursor.load(Ordering::Acquire),
            configured: !self.keys.is_empty(),
        }
    }
}

/// Masks a key for logging: first eight characters followed by `...`.
pub(crate) fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(MASK_PREFIX_LEN).collect();
    format!("{prefix}...")
}
