//! Pacing gate for upstream TMDB requests.

use std::time::{Duration, Instant};

/// Default minimum spacing between dispatches.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum-spacing throttle shared by every upstream attempt.
///
/// Guarantees a floor on the gap between consecutive dispatch instants.
/// There is no burst allowance and no per-key accounting.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct TmdbRateLimiter {
    /// Minimum interval between dispatches.
    min_interval: Duration,
    /// Last dispatch timestamp.
    last_dispatch: Option<Instant>,
}

impl Default for TmdbRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl TmdbRateLimiter {
    /// Creates a gate with the given minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: None,
        }
    }

    /// Configured minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspends until the next dispatch is allowed, then records it.
    ///
    /// Returns how long the caller was held back.
    pub async fn wait(&mut self) -> Duration {
        let mut waited = Duration::ZERO;

        if let Some(last) = self.last_dispatch {
            let elapsed = Instant::now().duration_since(last);
            if elapsed < self.min_interval {
                waited = self.min_interval.saturating_sub(elapsed);
                tracing::debug!(
                    wait_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "Rate limiting: waiting before request"
                );
                tokio::time::sleep(waited).await;
            }
        }

        self.last_dispatch = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_dispatch_does_not_wait() {
        // Arrange
        let mut limiter = TmdbRateLimiter::new(Duration::from_secs(1));

        // Act
        let start = Instant::now();
        let waited = limiter.wait().await;

        // Assert
        assert_eq!(waited, Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_back_to_back_dispatches_respect_floor() {
        // Arrange
        let mut limiter = TmdbRateLimiter::new(Duration::from_millis(50));

        // Act
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        let elapsed = start.elapsed();

        // Assert
        assert!(elapsed >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_natural_gap_adds_no_delay() {
        // Arrange
        let mut limiter = TmdbRateLimiter::new(Duration::from_millis(20));
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Act
        let waited = limiter.wait().await;

        // Assert
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_records_dispatch_time() {
        // Arrange
        let mut limiter = TmdbRateLimiter::new(Duration::ZERO);

        // Act
        limiter.wait().await;

        // Assert
        assert!(limiter.last_dispatch.is_some());
    }

    #[test]
    fn test_default_interval() {
        // Arrange & Act
        let limiter = TmdbRateLimiter::default();

        // Assert
        assert_eq!(limiter.min_interval(), Duration::from_millis(100));
    }
}
