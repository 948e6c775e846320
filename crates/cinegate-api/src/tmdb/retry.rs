//! Retry policy: attempt budget, backoff schedule, and failure classification.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use reqwest::StatusCode;

/// Default number of attempts per fetch.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Default delay before the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(3000);

/// Default growth factor between consecutive retry delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Multiplier applied per additional failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BACKOFF_BASE,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt `attempt` (1-based):
    /// `base × multiplier^(attempt − 1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        if !factor.is_finite() || factor < 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

/// Whether an HTTP status is worth retrying (429 or 5xx).
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Whether a transport error happened before a status arrived or while
/// the body was read: timeouts, connect failures, and connections the
/// peer closed or reset mid-exchange.
///
/// Request construction and redirect policy failures are terminal.
#[must_use]
pub fn is_retryable_transport(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() || err.is_decode() || err.status().is_some() {
        return false;
    }
    err.is_timeout()
        || err.is_connect()
        || err.is_request()
        || err.is_body()
        || has_dropped_connection(err)
}

/// Whether `err` or any of its sources is an I/O error of a dropped
/// connection kind.
fn has_dropped_connection(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::TimedOut
            )
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::fmt;

    use tokio::io::AsyncReadExt;

    use super::*;

    /// Error wrapping another, like a client error around an I/O failure.
    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_default_schedule() {
        // Arrange
        let policy = RetryPolicy::default();

        // Act
        let delays: Vec<Duration> = (1..=5).map(|a| policy.delay_after(a)).collect();

        // Assert
        assert_eq!(
            delays,
            [
                Duration::from_millis(3000),
                Duration::from_millis(4500),
                Duration::from_millis(6750),
                Duration::from_millis(10125),
                Duration::from_micros(15_187_500),
            ]
        );
    }

    #[test]
    fn test_zero_base_never_waits() {
        // Arrange
        let policy = RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        };

        // Act & Assert
        assert_eq!(policy.delay_after(4), Duration::ZERO);
    }

    #[test]
    fn test_huge_attempt_saturates() {
        // Arrange
        let policy = RetryPolicy::default();

        // Act & Assert
        assert_eq!(policy.delay_after(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_retryable_statuses() {
        // Arrange & Act & Assert
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_dropped_connection_kinds_in_source_chain() {
        // Arrange
        let reset = Wrapped(io::Error::from(io::ErrorKind::ConnectionReset));
        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        let not_found = Wrapped(io::Error::from(io::ErrorKind::NotFound));

        // Act & Assert
        assert!(has_dropped_connection(&reset));
        assert!(has_dropped_connection(&eof));
        assert!(!has_dropped_connection(&not_found));
        assert!(!has_dropped_connection(&fmt::Error));
    }

    #[test]
    fn test_builder_error_is_terminal() {
        // Arrange
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();

        // Act & Assert
        assert!(err.is_builder());
        assert!(!is_retryable_transport(&err));
    }

    #[tokio::test]
    async fn test_refused_connection_is_retryable() {
        // Arrange
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        // Act
        let err = reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap_err();

        // Assert
        assert!(is_retryable_transport(&err));
    }

    #[tokio::test]
    async fn test_peer_hang_up_is_retryable() {
        // Arrange
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
        });

        // Act
        let err = reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap_err();

        // Assert
        assert!(err.status().is_none());
        assert!(is_retryable_transport(&err));
    }
}
