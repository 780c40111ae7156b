//! Error types for sqlreplay.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for replay operations.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors (syntax errors, constraint violations, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Read failures on the dump stream (anything other than clean end-of-stream)
    #[error("Stream error: {0}")]
    Stream(String),

    /// Configuration errors (invalid config file, oversized statement, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplayError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a stream error with the given message.
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Execution(_) => "Execution Error",
            Self::Stream(_) => "Stream Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        Self::Stream(err.to_string())
    }
}

/// Result type alias using ReplayError.
pub type Result<T> = std::result::Result<T, ReplayError>;
