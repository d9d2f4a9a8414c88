//! Text embedding capability.
//!
//! The memory store only needs `embed(text) -> vector`. Two backends:
//! [`OpenAiEmbedder`] for real runs and [`HashEmbedder`], a deterministic
//! feature-hashing encoder for offline runs and tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::client::OPENAI_BASE_URL;
use crate::error::{LlmError, Result};

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Hash embedder
// ---------------------------------------------------------------------------

/// Default dimension for [`HashEmbedder`].
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Bag-of-words feature hashing.
///
/// Tokens are lowercased alphanumeric runs. Each token lands in one bucket
/// with a sign taken from a second hash bit; the result is L2-normalized.
/// Identical text always maps to the identical vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Synchronous encoding, usable outside an async context.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}

// ---------------------------------------------------------------------------
// OpenAI embedder
// ---------------------------------------------------------------------------

/// Embeddings through an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        base_url: Option<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: "openai".into(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::Request {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_owned()),
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| {
                LlmError::Request {
                    reason: format!("invalid authorization header: {e}"),
                }
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = json!({ "model": self.model, "input": text });
        tracing::debug!(url = %url, model = %self.model, chars = text.len(), "requesting embedding");

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Request {
                reason: format!("embeddings API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| LlmError::Parse {
            reason: format!("invalid JSON response: {e}"),
        })?;
        parse_embedding_response(&v)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Extract `data[0].embedding` from an embeddings response.
pub fn parse_embedding_response(v: &Value) -> Result<Vec<f32>> {
    let values = v["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| LlmError::Parse {
            reason: "missing `data[0].embedding` in response".into(),
        })?;
    values
        .iter()
        .map(|x| {
            x.as_f64().map(|f| f as f32).ok_or_else(|| LlmError::Parse {
                reason: "non-numeric embedding component".into(),
            })
        })
        .collect()
}
