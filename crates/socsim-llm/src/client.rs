//! Multi-provider LLM client.
//!
//! Supports the **OpenAI Chat Completions API** (including OpenAI-compatible
//! endpoints such as Ollama, Together, and vLLM) and the **Gemini
//! generateContent API**. Only non-streaming calls are made: every agent step
//! needs the whole answer before it can continue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{LlmError, Result};
use crate::model::LanguageModel;
use crate::types::{ChatRequest, Completion, Message, Role};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which LLM provider the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
    /// Google Gemini generateContent API.
    Gemini,
}

impl LlmProvider {
    /// Lowercase name used in config files and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(LlmError::Config {
                reason: format!("unknown llm provider `{other}`"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Default model identifier.
    pub default_model: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl LlmClientConfig {
    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            default_model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create a configuration for any OpenAI-compatible API.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::openai(api_key, model)
        }
    }

    /// Create a configuration for the Gemini API.
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Gemini,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_owned(),
            default_model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client for either the OpenAI Chat Completions API or the Gemini
/// generateContent API.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: config.provider.to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Request {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// The configured provider.
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.config.default_model)
    }

    /// POST a JSON body and return the parsed JSON response.
    async fn post_json(&self, url: &str, headers: HeaderMap, body: &Value) -> Result<Value> {
        let resp = self.http.post(url).headers(headers).json(body).send().await?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| LlmError::Request {
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(LlmError::Request {
                reason: format!("API returned {status}: {text}"),
            });
        }

        serde_json::from_str(&text).map_err(|e| LlmError::Parse {
            reason: format!("invalid JSON response: {e}"),
        })
    }

    // =======================================================================
    // OpenAI implementation
    // =======================================================================

    async fn chat_openai(&self, request: &ChatRequest) -> Result<Completion> {
        let body = self.build_openai_request_body(request);
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| LlmError::Request {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %body["model"], n = request.n, provider = "openai", "sending LLM request");

        let v = self.post_json(&url, headers, &body).await?;
        parse_openai_response(&v, request.n)
    }

    /// Build the JSON body for the OpenAI Chat Completions API.
    fn build_openai_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model_for(request),
            "messages": messages_to_openai(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if request.n > 1 {
            body["n"] = json!(request.n);
        }

        if !request.stop.is_empty() {
            body["stop"] = json!(request.stop);
        }

        body
    }

    // =======================================================================
    // Gemini implementation
    // =======================================================================

    async fn chat_gemini(&self, request: &ChatRequest) -> Result<Completion> {
        let body = build_gemini_request_body(request);
        let model = self.model_for(request);
        let url = format!("{}/models/{model}:generateContent", self.config.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| LlmError::Request {
                reason: format!("invalid api key header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %model, n = request.n, provider = "gemini", "sending LLM request");

        let v = self.post_json(&url, headers, &body).await?;
        parse_gemini_response(&v, request.n, request.max_tokens)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn call(&self, request: &ChatRequest) -> Result<Completion> {
        match self.config.provider {
            LlmProvider::OpenAI => self.chat_openai(request).await,
            LlmProvider::Gemini => self.chat_gemini(request).await,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.default_model
    }
}

// ===========================================================================
// OpenAI format conversion (free functions)
// ===========================================================================

/// Convert messages to the OpenAI wire format.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| json!({ "role": msg.role, "content": msg.content }))
        .collect()
}

/// Parse an OpenAI Chat Completions response.
///
/// `content_filter` finishes and `length` finishes without text are provider
/// errors. For `n > 1`, choices without text are dropped.
pub fn parse_openai_response(v: &Value, n: u32) -> Result<Completion> {
    let choices = v["choices"].as_array().filter(|c| !c.is_empty()).ok_or_else(|| {
        LlmError::provider("no choices in API response")
    })?;

    let extract = |choice: &Value| -> Result<String> {
        let finish = choice["finish_reason"].as_str().unwrap_or_default();
        if finish == "content_filter" {
            return Err(LlmError::provider(format!(
                "content was blocked. finish reason: {finish}"
            )));
        }
        match choice["message"]["content"].as_str() {
            Some(text) if !(text.is_empty() && finish == "length") => Ok(text.to_owned()),
            _ if finish == "length" => Err(LlmError::provider(
                "response hit the max_tokens limit but returned no text",
            )),
            _ => Err(LlmError::provider(format!(
                "choice has no extractable text. finish reason: {finish}"
            ))),
        }
    };

    if n <= 1 {
        return extract(&choices[0]).map(Completion::One);
    }

    let texts: Vec<String> = choices
        .iter()
        .take(n as usize)
        .filter_map(|c| extract(c).ok())
        .collect();
    if texts.is_empty() {
        return Err(LlmError::provider("no choice returned any text"));
    }
    Ok(Completion::Many(texts))
}

// ===========================================================================
// Gemini format conversion (free functions)
// ===========================================================================

/// Build the JSON body for the Gemini generateContent API.
///
/// System messages are joined into `systemInstruction`; assistant turns use
/// the `model` role.
pub fn build_gemini_request_body(request: &ChatRequest) -> Value {
    let mut system: Option<String> = None;
    let mut contents: Vec<Value> = Vec::with_capacity(request.messages.len());

    for msg in &request.messages {
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            Role::User => contents.push(json!({
                "role": "user",
                "parts": [{ "text": msg.content }],
            })),
            Role::Assistant => contents.push(json!({
                "role": "model",
                "parts": [{ "text": msg.content }],
            })),
        }
    }

    let mut generation_config = json!({
        "temperature": request.temperature,
        "maxOutputTokens": request.max_tokens,
        "candidateCount": request.n,
    });
    if !request.stop.is_empty() {
        generation_config["stopSequences"] = json!(request.stop);
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": generation_config,
    });
    if let Some(system) = system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

/// Parse a Gemini generateContent response.
pub fn parse_gemini_response(v: &Value, n: u32, max_tokens: u32) -> Result<Completion> {
    if let Some(reason) = v["promptFeedback"]["blockReason"].as_str() {
        return Err(LlmError::provider(format!("prompt blocked: {reason}")));
    }

    let candidates = v["candidates"].as_array().filter(|c| !c.is_empty()).ok_or_else(|| {
        LlmError::provider(format!(
            "no candidates in API response (prompt_feedback: {})",
            v["promptFeedback"]
        ))
    })?;

    if n <= 1 {
        let candidate = &candidates[0];
        if candidate["content"].is_null() {
            return Err(LlmError::provider("candidate has no content"));
        }

        let finish = candidate["finishReason"].as_str().unwrap_or_default();
        if matches!(finish, "SAFETY" | "RECITATION") {
            return Err(LlmError::provider(format!(
                "content was blocked. finish reason: {finish}"
            )));
        }

        return match candidate_text(candidate) {
            Some(text) => Ok(Completion::One(text.to_owned())),
            None if finish == "MAX_TOKENS" => Err(LlmError::provider(format!(
                "response hit MAX_TOKENS limit ({max_tokens} tokens) but returned no text"
            ))),
            None => Err(LlmError::provider(format!(
                "candidate has no extractable text. finish reason: {finish}"
            ))),
        };
    }

    let texts: Vec<String> = candidates
        .iter()
        .take(n as usize)
        .filter_map(|c| candidate_text(c).map(str::to_owned))
        .collect();
    if texts.is_empty() {
        return Err(LlmError::provider("no candidate returned any text"));
    }
    Ok(Completion::Many(texts))
}

fn candidate_text(candidate: &Value) -> Option<&str> {
    candidate["content"]["parts"][0]["text"].as_str()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
