//! Error types and handling for the expense enricher

use thiserror::Error;

/// Main error type shared by the batch pipeline and the API proxy
#[derive(Error, Debug)]
pub enum EnricherError {
    /// Configuration-related errors, fatal at startup
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Transport-level failure reaching an upstream service
    #[error("{service} unreachable: {message}")]
    Network { service: String, message: String },

    /// Upstream answered with a non-success status
    #[error("{service} returned HTTP {status}")]
    Http { service: String, status: u16 },

    /// Upstream answered but the body could not be decoded
    #[error("Invalid response from {service}: {message}")]
    Parse { service: String, message: String },

    /// Zero results or unknown entity
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Upstream quota exhausted
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Response is missing the data needed to compute a rate
    #[error("FX conversion failed: {message}")]
    Conversion { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Delimited file errors
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

impl EnricherError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new network error for the named upstream
    pub fn network<S: Into<String>, M: std::fmt::Display>(service: S, message: M) -> Self {
        Self::Network {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Create a new status error for the named upstream
    pub fn http<S: Into<String>>(service: S, status: u16) -> Self {
        Self::Http {
            service: service.into(),
            status,
        }
    }

    /// Create a new parse error for the named upstream
    pub fn parse<S: Into<String>, M: std::fmt::Display>(service: S, message: M) -> Self {
        Self::Parse {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn rate_limited<S: Into<String>>(message: S) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    pub fn conversion<S: Into<String>>(message: S) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Upstream status code carried by this error, if any
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            EnricherError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
