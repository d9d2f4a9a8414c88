//! Model and embedding capabilities for the social-simulation agents.
//!
//! - [`LanguageModel`]: the prompt → completion capability, implemented by
//!   [`LlmClient`] (OpenAI / Gemini over HTTP), [`ObservedModel`] (journaling
//!   wrapper) and [`ScriptedModel`] (tests).
//! - [`Embedder`]: text → vector, implemented by [`OpenAiEmbedder`] and
//!   [`HashEmbedder`].
//! - [`Journal`]: the append-only JSON-lines run log shared by every
//!   component of a run.

pub mod client;
pub mod embedding;
pub mod error;
pub mod journal;
pub mod mock;
pub mod model;
pub mod observed;
pub mod types;

pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use embedding::{DEFAULT_HASH_DIMENSION, Embedder, HashEmbedder, OpenAiEmbedder};
pub use error::{LlmError, Result};
pub use journal::{CallInput, CallOutput, Journal, JournalEntry};
pub use mock::ScriptedModel;
pub use model::LanguageModel;
pub use observed::ObservedModel;
pub use types::{CallSite, ChatRequest, Completion, DEFAULT_MAX_TOKENS, Message, Role};
