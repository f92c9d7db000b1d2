// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote feed call failed
    #[error("Fetch error on {network} for '{criterion}': {message}")]
    Fetch {
        network: String,
        criterion: String,
        message: String,
    },

    /// Record cannot be stored (empty identity or source id)
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Persistent store failure other than a duplicate identity
    #[error("Store error: {0}")]
    Store(String),
}

/// Log sink rejections. Each one loses exactly one record and nothing else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Record cannot fit in an empty worker buffer
    #[error("record of {len} bytes exceeds buffer capacity of {capacity} bytes")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Every intake queue stayed full past the enqueue timeout
    #[error("intake queue for series '{series}' saturated, record dropped")]
    QueueSaturated { series: String },

    /// The series directory could not be set up
    #[error("series '{series}' unavailable: {reason}")]
    SeriesUnavailable { series: String, reason: String },

    /// The sink was shut down
    #[error("log sink is shut down")]
    Closed,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a network/criterion pair.
    pub fn fetch(
        network: impl Into<String>,
        criterion: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Fetch {
            network: network.into(),
            criterion: criterion.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed record error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_names_network_and_criterion() {
        let err = AppError::fetch("twitter", "#rust", "503 Service Unavailable");
        assert_eq!(
            err.to_string(),
            "Fetch error on twitter for '#rust': 503 Service Unavailable"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
