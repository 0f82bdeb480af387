//! Error types for colloquy.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColloquyError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio errors
    #[error("Audio source failed: {message}")]
    AudioSource { message: String },

    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    // Pipeline errors
    #[error("Batching error: {message}")]
    Batching { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    // Outbound service errors
    #[error("API call failed: {0}")]
    Api(#[from] ApiError),

    // Subscriber protocol errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Server error: {message}")]
    Server { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ColloquyError>;

/// Failure classes for outbound transcription and generative API calls.
///
/// Transient failures are retried by the dispatcher; permanent failures
/// skip straight to the next model in the fallback chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },
}

impl ApiError {
    /// Transient failures are worth retrying against the same model.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ApiError::Client { .. })
    }

    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short stable identifier used in error events.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Timeout => "timeout",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Server { .. } => "server_error",
            ApiError::Client { .. } => "client_error",
            ApiError::Network { .. } => "network",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::RateLimited { retry_after: None }.is_transient());
        assert!(
            ApiError::Server {
                status: 503,
                message: "overloaded".to_string(),
            }
            .is_transient()
        );
        assert!(
            ApiError::Network {
                message: "connection reset".to_string(),
            }
            .is_transient()
        );
        assert!(
            !ApiError::Client {
                status: 401,
                message: "bad key".to_string(),
            }
            .is_transient()
        );
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let limited = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(ApiError::Timeout.retry_after(), None);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ApiError::Timeout.kind(), "timeout");
        assert_eq!(
            ApiError::RateLimited { retry_after: None }.kind(),
            "rate_limited"
        );
        assert_eq!(
            ApiError::Client {
                status: 404,
                message: String::new(),
            }
            .kind(),
            "client_error"
        );
    }

    #[test]
    fn test_api_error_display() {
        let error = ApiError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(error.to_string(), "server error (502): bad gateway");
    }

    #[test]
    fn test_colloquy_error_from_api_error() {
        let error: ColloquyError = ApiError::Timeout.into();
        assert!(error.to_string().contains("request timed out"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ColloquyError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ColloquyError>();
        assert_sync::<ColloquyError>();
        assert_send::<ApiError>();
        assert_sync::<ApiError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
