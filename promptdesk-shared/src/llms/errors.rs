//! # LLM Error Types

use thiserror::Error;

/// Result type alias for provider operations
pub type LLMResult<T> = Result<T, LLMError>;

/// Errors raised while talking to a completion provider
#[derive(Error, Debug)]
pub enum LLMError {
    /// Invalid provider configuration
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfiguration { field: String, message: String },

    /// No credential configured for the provider
    #[error("Missing credentials for provider {provider}")]
    MissingCredentials { provider: String },

    /// Transport failure reaching the provider
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error status or error payload
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider payload could not be decoded
    #[error("Failed to decode provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response stream broke off mid-way
    #[error("Stream interrupted: {reason}")]
    Stream { reason: String },
}

impl LLMError {
    /// Create a new invalid configuration error
    #[must_use]
    pub fn invalid_config<T: Into<String>, U: Into<String>>(field: T, message: U) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new stream interruption error
    #[must_use]
    pub fn stream_interrupted<T: Into<String>>(reason: T) -> Self {
        Self::Stream {
            reason: reason.into(),
        }
    }

    /// Whether the failure originated upstream rather than in local setup.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::Decode(_) | Self::Stream { .. }
        )
    }
}
