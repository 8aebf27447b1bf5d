//! Error types for reasoning-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::Provider;

/// Result type alias using reasoning-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// One failed backend attempt inside a single gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: Provider,
    pub model: String,
    pub message: String,
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.provider, self.model, self.message)
    }
}

/// Errors that can occur while reasoning.
#[derive(Error, Debug)]
pub enum Error {
    /// Every configured backend failed for one gateway call
    #[error("All language model providers failed ({})", format_attempts(.attempts))]
    ProviderExhausted { attempts: Vec<ProviderAttempt> },

    /// LLM API error
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: Provider, message: String },

    /// LLM error (simple variant)
    #[error("LLM error: {0}")]
    LLM(String),

    /// Timeout during an external call
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The run was cancelled by its caller
    #[error("Reasoning run cancelled")]
    Cancelled,

    /// Web search tool failure
    #[error("Web tool error: {0}")]
    WebTool(String),

    /// Memory recall tool failure
    #[error("Memory tool error: {0}")]
    MemoryTool(String),

    /// Math evaluation tool failure
    #[error("Math tool error: {0}")]
    MathTool(String),

    /// The query was rejected before the pipeline started
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an LLM API error.
    pub fn llm_api(provider: Provider, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Whether this error came from a cancelled run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
