//! Error type definitions for the stream resolver

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Errors raised by outbound provider calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request did not complete within the gateway's request timeout
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// Connection or transport level failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// Upstream answered with a non-success status
    #[error("HTTP error: {status} - {url}")]
    Http { status: u16, url: String },

    /// Upstream kept throttling after every retry was spent
    #[error("Rate limited: {url} - gave up after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    /// Body could not be decoded into the expected shape
    #[error("Malformed response from {provider}: {message}")]
    Malformed { provider: String, message: String },

    /// The gateway drain loop went away before answering
    #[error("Request gateway is no longer running")]
    GatewayClosed,
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Create a malformed-payload error for the named provider
    pub fn malformed<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Malformed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}
