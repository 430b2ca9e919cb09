//! Error types for CiteForge
//!
//! Provides a single error enum shared by the crawler, graph and CLI crates:
//! - Distinct error types for each failure mode of a crawl
//! - Machine-readable error codes (also used as profile labels)
//! - Retry classification for the request executor

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Transport errors (1xxx)
    TransientTransportError,
    RateLimited,
    ServerError,

    // Response errors (2xxx)
    ClientError,
    MalformedResponse,
    MissingField,
    UpstreamError,

    // Request construction (3xxx)
    InvalidRequest,

    // Graph errors (4xxx)
    FormatError,
    DuplicateWork,
    InvalidGraph,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    IoError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Transport (1xxx)
            ErrorCode::TransientTransportError => 1001,
            ErrorCode::RateLimited => 1002,
            ErrorCode::ServerError => 1003,

            // Response (2xxx)
            ErrorCode::ClientError => 2001,
            ErrorCode::MalformedResponse => 2002,
            ErrorCode::MissingField => 2003,
            ErrorCode::UpstreamError => 2004,

            // Request (3xxx)
            ErrorCode::InvalidRequest => 3001,

            // Graph (4xxx)
            ErrorCode::FormatError => 4001,
            ErrorCode::DuplicateWork => 4002,
            ErrorCode::InvalidGraph => 4003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IoError => 9004,
        }
    }

    /// Short snake_case label, used for profile keys and metric labels
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCode::TransientTransportError => "transport_error",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::ServerError => "server_error",
            ErrorCode::ClientError => "client_error",
            ErrorCode::MalformedResponse => "malformed_response",
            ErrorCode::MissingField => "missing_field",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::FormatError => "format_error",
            ErrorCode::DuplicateWork => "duplicate_work",
            ErrorCode::InvalidGraph => "invalid_graph",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ConfigurationError => "configuration_error",
            ErrorCode::SerializationError => "serialization_error",
            ErrorCode::IoError => "io_error",
        }
    }

    /// Whether a failure of this kind is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::TransientTransportError | ErrorCode::RateLimited | ErrorCode::ServerError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Rate limited by upstream (HTTP 429)")]
    RateLimited,

    #[error("Upstream server error (HTTP {status})")]
    ServerError { status: u16 },

    // Response errors
    #[error("Upstream rejected request (HTTP {status}): {body}")]
    ClientError { status: u16, body: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Upstream call failed: {message}")]
    Upstream { message: String },

    // Request construction
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Graph errors
    #[error("Format error: {message}")]
    Format { message: String },

    #[error("Duplicate work identifier in stream: {id}")]
    DuplicateWork { id: String },

    #[error("Invalid graph: {message}")]
    InvalidGraph { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Transport { .. } => ErrorCode::TransientTransportError,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::ServerError { .. } => ErrorCode::ServerError,
            AppError::ClientError { .. } => ErrorCode::ClientError,
            AppError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            AppError::Format { .. } => ErrorCode::FormatError,
            AppError::DuplicateWork { .. } => ErrorCode::DuplicateWork,
            AppError::InvalidGraph { .. } => ErrorCode::InvalidGraph,
            AppError::Csv(_) => ErrorCode::FormatError,
            AppError::HttpClient(_) => ErrorCode::TransientTransportError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io(_) => ErrorCode::IoError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the executor should retry after this error
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// Shorthand for a format error
    pub fn format(message: impl Into<String>) -> Self {
        AppError::Format {
            message: message.into(),
        }
    }

    /// Shorthand for a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::MalformedResponse {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::MissingField {
            field: "referenced_works".into(),
        };
        assert_eq!(err.code(), ErrorCode::MissingField);
        assert_eq!(err.code().as_code(), 2003);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_classification() {
        assert!(AppError::RateLimited.is_retryable());
        assert!(AppError::ServerError { status: 503 }.is_retryable());
        assert!(AppError::Transport {
            message: "timed out".into()
        }
        .is_retryable());

        let not_found = AppError::ClientError {
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_retryable());
        assert!(!AppError::malformed("not json").is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), ErrorCode::IoError);
    }

    #[test]
    fn test_code_labels() {
        assert_eq!(ErrorCode::RateLimited.to_string(), "rate_limited");
        assert_eq!(
            serde_json::to_string(&ErrorCode::FormatError).unwrap(),
            "\"FORMAT_ERROR\""
        );
    }
}
