//! Core types for LLM interaction.
//!
//! These types are provider-agnostic; [`crate::client`] translates them into
//! the wire format of each provider.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the user.
    User,
    /// Output from the model.
    Assistant,
}

/// A single message in a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Call site
// ---------------------------------------------------------------------------

/// Identifies which component issued a model call.
///
/// Written into every `llm_call` journal entry as `module` / `function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub module: &'static str,
    pub function: &'static str,
}

impl CallSite {
    pub const fn new(module: &'static str, function: &'static str) -> Self {
        Self { module, function }
    }
}

impl Default for CallSite {
    fn default() -> Self {
        Self::new("unknown", "unknown")
    }
}

// ---------------------------------------------------------------------------
// Chat request
// ---------------------------------------------------------------------------

/// Default `max_tokens` for a call when the caller does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// A full request to send to a model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model override; `None` uses the client's default model.
    pub model: Option<String>,

    /// The prompt, in order.
    pub messages: Vec<Message>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens per completion.
    pub max_tokens: u32,

    /// Stop sequences.
    pub stop: Vec<String>,

    /// Number of independent completions to request.
    pub n: u32,

    /// Who is calling (journal metadata only, never sent to the provider).
    pub site: CallSite,
}

impl ChatRequest {
    /// Create a request with the default sampling parameters
    /// (temperature 0.0, 500 tokens, one completion).
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            stop: Vec::new(),
            n: 1,
            site: CallSite::default(),
        }
    }

    /// Single user-message request.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::user(prompt)])
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = n.max(1);
        self
    }

    pub fn stop(mut self, stop: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn site(mut self, site: CallSite) -> Self {
        self.site = site;
        self
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// The text a model returned for one call.
///
/// `n == 1` requests produce [`Completion::One`]; `n > 1` requests produce
/// [`Completion::Many`], which may hold fewer than `n` entries when the
/// provider dropped some candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Completion {
    One(String),
    Many(Vec<String>),
}

impl Completion {
    /// The single answer, or the first candidate of a multi-completion.
    pub fn into_text(self) -> String {
        match self {
            Self::One(text) => text,
            Self::Many(texts) => texts.into_iter().next().unwrap_or_default(),
        }
    }

    /// All candidates, in provider order.
    pub fn into_candidates(self) -> Vec<String> {
        match self {
            Self::One(text) => vec![text],
            Self::Many(texts) => texts,
        }
    }

    /// Total characters across all candidates.
    pub fn text_len(&self) -> usize {
        match self {
            Self::One(text) => text.chars().count(),
            Self::Many(texts) => texts.iter().map(|t| t.chars().count()).sum(),
        }
    }
}
