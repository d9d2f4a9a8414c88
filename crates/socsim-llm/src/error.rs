//! Error types for the LLM layer.
//!
//! Every capability in this crate reports failures through [`LlmError`].
//! The [`LlmError::Provider`] variant is the one callers care about most: it
//! means the model endpoint answered but produced nothing usable.

/// Unified error type for model and embedding calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The provider could not produce usable text (blocked prompt, empty
    /// candidates, token limit hit with no output, missing content).
    #[error("provider error: {reason}")]
    Provider { reason: String },

    /// The HTTP request itself failed or returned a non-success status.
    #[error("llm request failed: {reason}")]
    Request { reason: String },

    /// The response body was not the JSON shape we expected.
    #[error("llm response parse error: {reason}")]
    Parse { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// Invalid client configuration.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// Journal or other file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LlmError>;

impl LlmError {
    /// Shorthand for a [`LlmError::Provider`] error.
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider {
            reason: reason.into(),
        }
    }

    /// Whether the endpoint answered but gave no usable text.
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request {
            reason: err.to_string(),
        }
    }
}
