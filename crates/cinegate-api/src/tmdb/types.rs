//! TMDB wire types and gateway status.

use serde::{Deserialize, Serialize};

use super::keys::KeyPoolStatus;

/// TMDB error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbErrorResponse {
    /// TMDB error code.
    pub status_code: u32,
    /// Error message.
    pub status_message: String,
    /// Success flag (always false for errors).
    #[serde(default)]
    pub success: bool,
}

/// Cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    /// Stored entries.
    pub size: usize,
    /// Maximum entries.
    pub capacity: usize,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
}

/// Health snapshot of a [`Gateway`](super::Gateway).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    /// API key pool.
    pub api_keys: KeyPoolStatus,
    /// Response cache.
    pub cache: CacheStatus,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_error_response() {
        // Arrange
        let json = r#"{"status_code":7,"status_message":"Invalid API key: You must be granted a valid key.","success":false}"#;

        // Act
        let error: TmdbErrorResponse = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(error.status_code, 7);
        assert!(!error.success);
        assert!(error.status_message.contains("Invalid API key"));
    }

    #[test]
    fn test_parse_error_response_without_success_flag() {
        // Arrange
        let json = r#"{"status_code":34,"status_message":"The resource you requested could not be found."}"#;

        // Act
        let error: TmdbErrorResponse = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(error.status_code, 34);
    }

    #[test]
    fn test_status_serializes_for_health_report() {
        // Arrange
        let status = GatewayStatus {
            api_keys: KeyPoolStatus {
                total: 3,
                current_index: 1,
                configured: true,
            },
            cache: CacheStatus {
                size: 4,
                capacity: 1000,
                ttl_secs: 1800,
            },
        };

        // Act
        let value = serde_json::to_value(&status).unwrap();

        // Assert
        assert_eq!(value["api_keys"]["total"], 3);
        assert_eq!(value["api_keys"]["current_index"], 1);
        assert_eq!(value["cache"]["capacity"], 1000);
    }
}
