//! Error types for address rotation
//!
//! This module defines all error types used throughout the crate.

use crate::traits::Operation;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for rotation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for address rotation
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider's view of an interface violates a rotation precondition
    /// (for example, the selected interface has no associated address)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A rotation step failed; the remaining steps were not attempted
    #[error("{operation} failed: {source}")]
    Step {
        /// The provider call that failed
        operation: Operation,
        /// The underlying provider error
        #[source]
        source: Box<Error>,
    },

    /// The rotation did not finish before its deadline
    #[error("Rotation timed out after {0:?}")]
    Timeout(Duration),

    /// Filesystem errors (pool file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Interface, allocation or association not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Wrap a provider error as the failure of a rotation step
    pub fn step(operation: Operation, source: Error) -> Self {
        Self::Step {
            operation,
            source: Box::new(source),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// The rotation step this error came from, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Step { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Whether this error is a precondition violation
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
