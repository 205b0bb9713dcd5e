//! Error types for taskdesk.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for taskdesk operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskdeskError {
    /// Missing or malformed connection parameters (unparsable endpoint, bad port, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session establishment errors (host unreachable, auth rejected, login timeout, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The liveness probe itself failed, as opposed to reporting a dead session.
    #[error("Validity check error: {0}")]
    ValidityCheck(String),

    /// Query execution errors (syntax errors, constraint violations, timeouts, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// OS keyring errors.
    #[error("Secret storage error: {0}")]
    Secret(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskdeskError {
    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a validity check error with the given message.
    pub fn validity_check(msg: impl Into<String>) -> Self {
        Self::ValidityCheck(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a secret storage error with the given message.
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::Secret(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::ValidityCheck(_) => "Validity Check Error",
            Self::Query(_) => "Query Error",
            Self::Secret(_) => "Secret Storage Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using TaskdeskError.
pub type Result<T> = std::result::Result<T, TaskdeskError>;
