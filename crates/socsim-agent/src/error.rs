//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`]. The workflow
//! catches every variant once, at the top of a task, and turns it into the
//! sentinel decision.

use std::path::PathBuf;

use socsim_llm::LlmError;
use socsim_store::StoreError;

/// Unified error type for the agent layer.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Upstream crate errors -----------------------------------------------
    /// A model call or embedding failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The memory store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    // -- Data access ---------------------------------------------------------
    /// The interaction tool could not answer a lookup.
    #[error("interaction tool failed: {reason}")]
    Tool { reason: String },

    /// A dataset or task file could not be read or parsed.
    #[error("dataset error in {}: {reason}", path.display())]
    Dataset { path: PathBuf, reason: String },

    // -- Configuration -------------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    Config { reason: String },

    // -- I/O and serialization -----------------------------------------------
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn tool(reason: impl Into<String>) -> Self {
        Self::Tool {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;
