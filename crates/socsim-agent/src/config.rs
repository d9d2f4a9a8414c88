//! Run configuration.
//!
//! Loaded from TOML, with every section optional:
//!
//! ```toml
//! [llm]
//! provider = "gemini"
//! model = "gemini-2.5-flash"
//!
//! [embedding]
//! provider = "hash"
//! dimension = 384
//!
//! [agent]
//! reasoning = "cot"
//! memory = "dilu"
//!
//! [run]
//! max_workers = 10
//! log_path = "logs/run.jsonl"
//! ```
//!
//! After the file, `SOCSIM_MODEL`, `SOCSIM_PROVIDER`, `SOCSIM_WORKERS` and
//! `SOCSIM_LOG` override the matching fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use socsim_llm::{DEFAULT_HASH_DIMENSION, DEFAULT_MAX_TOKENS, LlmProvider};
use socsim_store::{MemoryKind, MemoryStoreConfig};

use crate::error::{AgentError, Result};
use crate::reasoning::ReasoningKind;
use crate::runner::{DEFAULT_MAX_WORKERS, RunnerConfig};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// `openai` or `gemini`.
    pub provider: String,
    pub model: String,
    /// Overrides the provider's public endpoint (e.g. a local
    /// OpenAI-compatible server).
    pub base_url: Option<String>,
    /// Variable holding the API key. Defaults per provider.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_owned(),
            model: "gemini-2.5-flash".to_owned(),
            base_url: None,
            api_key_env: None,
            timeout_secs: 120,
        }
    }
}

impl LlmSection {
    pub fn provider(&self) -> Result<LlmProvider> {
        self.provider.parse().map_err(AgentError::from)
    }

    /// Name of the environment variable the API key is read from.
    pub fn api_key_var(&self) -> Result<String> {
        if let Some(var) = &self.api_key_env {
            return Ok(var.clone());
        }
        Ok(match self.provider()? {
            LlmProvider::OpenAI => "OPENAI_API_KEY".to_owned(),
            LlmProvider::Gemini => "GEMINI_API_KEY".to_owned(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local feature hashing; needs no network.
    #[default]
    Hash,
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            model: "text-embedding-3-small".to_owned(),
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub reasoning: String,
    pub memory: String,
    pub max_tokens: u32,
    /// Persona text placed before every task description.
    pub profile_type_prompt: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            reasoning: ReasoningKind::Cot.as_str().to_owned(),
            memory: MemoryKind::Dilu.as_str().to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            profile_type_prompt: String::new(),
        }
    }
}

impl AgentSection {
    pub fn reasoning_kind(&self) -> Result<ReasoningKind> {
        self.reasoning.parse()
    }

    pub fn memory_kind(&self) -> Result<MemoryKind> {
        self.memory.parse().map_err(AgentError::from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Directory for on-disk stores. In-memory SQLite when unset.
    pub root_dir: Option<PathBuf>,
}

impl MemorySection {
    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig {
            root_dir: self.root_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub max_workers: usize,
    pub enable_threading: bool,
    /// Journal file. No journal is written when unset.
    pub log_path: Option<PathBuf>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            enable_threading: true,
            log_path: None,
        }
    }
}

impl RunSection {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::from_threading(self.enable_threading, self.max_workers)
    }
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub agent: AgentSection,
    pub memory: MemorySection,
    pub run: RunSection,
}

impl SimConfig {
    /// Load from `path` (defaults when `None`), apply process environment
    /// overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    AgentError::config(format!("failed to read {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "loading config");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AgentError::config(format!("invalid config: {e}")))
    }

    /// Apply `SOCSIM_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(model) = lookup("SOCSIM_MODEL") {
            debug!(%model, "model overridden from environment");
            self.llm.model = model;
        }
        if let Some(provider) = lookup("SOCSIM_PROVIDER") {
            debug!(%provider, "provider overridden from environment");
            self.llm.provider = provider;
        }
        if let Some(workers) = lookup("SOCSIM_WORKERS") {
            self.run.max_workers = workers.trim().parse().map_err(|_| {
                AgentError::config(format!("SOCSIM_WORKERS is not a number: {workers}"))
            })?;
        }
        if let Some(log) = lookup("SOCSIM_LOG") {
            self.run.log_path = Some(PathBuf::from(log));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.max_workers == 0 {
            return Err(AgentError::config("run.max_workers must be at least 1"));
        }
        if self.embedding.dimension == 0 {
            return Err(AgentError::config("embedding.dimension must be at least 1"));
        }
        if self.agent.max_tokens == 0 {
            return Err(AgentError::config("agent.max_tokens must be at least 1"));
        }
        self.llm.provider()?;
        self.agent.reasoning_kind()?;
        self.agent.memory_kind()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.run.max_workers, 10);
        assert_eq!(config.llm.api_key_var().unwrap(), "GEMINI_API_KEY");
        assert_eq!(config.agent.reasoning_kind().unwrap(), ReasoningKind::Cot);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = SimConfig::from_toml_str(
            "[agent]\nreasoning = \"tot\"\n\n[embedding]\nprovider = \"openai\"\ndimension = 1536\n",
        )
        .unwrap();
        assert_eq!(config.agent.reasoning_kind().unwrap(), ReasoningKind::Tot);
        assert_eq!(config.agent.memory_kind().unwrap(), MemoryKind::Dilu);
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.llm.provider, "gemini");
    }

    #[test]
    fn env_overrides_win() {
        let mut config = SimConfig::from_toml_str("[run]\nmax_workers = 2\n").unwrap();
        config
            .apply_overrides(|key| match key {
                "SOCSIM_WORKERS" => Some("6".to_owned()),
                "SOCSIM_PROVIDER" => Some("openai".to_owned()),
                "SOCSIM_LOG" => Some("run.jsonl".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.run.max_workers, 6);
        assert_eq!(config.llm.api_key_var().unwrap(), "OPENAI_API_KEY");
        assert_eq!(config.run.log_path, Some(PathBuf::from("run.jsonl")));
    }

    #[test]
    fn bad_worker_override_is_error() {
        let mut config = SimConfig::default();
        assert!(config.apply_overrides(|_| Some("many".to_owned())).is_err());
    }

    #[test]
    fn validate_rejects_zero_workers_and_dimension() {
        let mut config = SimConfig::default();
        config.run.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.agent.memory = "lstm".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn threading_off_forces_single_worker() {
        let config = SimConfig::from_toml_str("[run]\nenable_threading = false\n").unwrap();
        assert_eq!(config.run.runner_config().max_workers, 1);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socsim.toml");
        std::fs::write(&path, "[memory]\nroot_dir = \"stores\"\n").unwrap();
        let config = SimConfig::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.memory.store_config().root_dir, Some(PathBuf::from("stores")));

        std::fs::write(&path, "[run\n").unwrap();
        assert!(SimConfig::load(Some(path.as_path())).is_err());
    }
}
