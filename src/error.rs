//! # Error Handling
//!
//! Custom error types for the detector and the way they surface over HTTP.
//!
//! ## Error Categories:
//! - **Configuration errors**: fatal at startup, the process does not start
//! - **Transient I/O errors**: datagram sends and LED writes; logged, counted, suppressed
//! - **Pipeline contract errors**: e.g. asking the peak detector to judge an empty batch
//! - **Request errors**: malformed query parameters on the read-only HTTP surface
//!
//! ## Key Rust Concepts:
//! - **enum variants with data**: each variant carries a human-readable message
//! - **From trait**: lets `?` convert library errors into `AppError` automatically
//! - **ResponseError trait**: turns an `AppError` into a JSON HTTP response

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::ConfigError("delay must be at least one sample".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Unexpected internal failures
    Internal(String),

    /// Client sent invalid query parameters
    BadRequest(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// The peak detector was handed a batch with no samples in it
    EmptyBatch,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::EmptyBatch => write!(f, "Peak detection requires at least one sample"),
        }
    }
}

impl std::error::Error for AppError {}

/// Maps each error onto an HTTP status and a consistent JSON body:
///
/// ```json
/// {
///   "error": {
///     "type": "bad_request",
///     "message": "max_points must be greater than 0",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type) = match self {
            AppError::BadRequest(_) => (actix_web::http::StatusCode::BAD_REQUEST, "bad_request"),
            AppError::ConfigError(_) => {
                (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "config_error")
            }
            AppError::EmptyBatch => {
                (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "empty_batch")
            }
            AppError::Internal(_) => {
                (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Configuration loading failures (bad TOML syntax, unparsable environment
/// overrides, type mismatches) are configuration errors.
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::ConfigError("delay_sec must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: delay_sec must be positive");
        assert_eq!(
            AppError::EmptyBatch.to_string(),
            "Peak detection requires at least one sample"
        );
    }

    #[test]
    fn test_error_status_codes() {
        let bad = AppError::BadRequest("max_points must be greater than 0".to_string());
        assert_eq!(bad.error_response().status(), actix_web::http::StatusCode::BAD_REQUEST);

        let config = AppError::ConfigError("threshold must be positive".to_string());
        assert_eq!(
            config.error_response().status(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: AppError = config::ConfigError::Message("invalid type: string".to_string()).into();
        assert!(matches!(err, AppError::ConfigError(msg) if msg.contains("invalid type")));
    }
}
