//! Setup shared by the subcommands: tracing, configuration, and the model
//! stack.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use socsim_agent::{AgentFactory, DatasetTool, EmbeddingProvider, SimConfig};
use socsim_llm::{
    Embedder, HashEmbedder, Journal, LanguageModel, LlmClient, LlmClientConfig, LlmProvider,
    ObservedModel, OpenAiEmbedder,
};

use crate::cli::CommonArgs;

/// Log to stderr, filtered by `RUST_LOG` (falling back to `default_level`).
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Load the config file and fold in command-line overrides.
pub fn load_config(common: &CommonArgs, workers: Option<usize>) -> Result<SimConfig> {
    let mut config = SimConfig::load(common.config.as_deref()).context("failed to load config")?;
    if let Some(kind) = &common.reasoning {
        config.agent.reasoning = kind.clone();
    }
    if let Some(kind) = &common.memory {
        config.agent.memory = kind.clone();
    }
    if let Some(workers) = workers {
        config.run.max_workers = workers;
    }
    if let Some(log) = &common.log {
        config.run.log_path = Some(log.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub fn open_journal(config: &SimConfig) -> Result<Journal> {
    match &config.run.log_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let journal = Journal::create(path)
                .with_context(|| format!("failed to open journal {}", path.display()))?;
            info!(path = %path.display(), "journal enabled");
            Ok(journal)
        }
        None => Ok(Journal::disabled()),
    }
}

fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{var} is not set (add it to the environment or a .env file)"),
    }
}

pub fn build_model(config: &SimConfig, journal: &Journal) -> Result<Arc<dyn LanguageModel>> {
    let llm = &config.llm;
    let key = api_key(&llm.api_key_var()?)?;

    let mut client_config = match llm.provider()? {
        LlmProvider::OpenAI => LlmClientConfig::openai(key, &llm.model),
        LlmProvider::Gemini => LlmClientConfig::gemini(key, &llm.model),
    };
    if let Some(base_url) = &llm.base_url {
        client_config.base_url = base_url.clone();
    }
    client_config.timeout_secs = llm.timeout_secs;

    let client = LlmClient::new(client_config).context("failed to build LLM client")?;
    info!(provider = %llm.provider, model = %llm.model, "LLM client ready");
    Ok(Arc::new(ObservedModel::new(client, journal.clone())))
}

pub fn build_embedder(config: &SimConfig) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;
    Ok(match embedding.provider {
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(embedding.dimension)),
        EmbeddingProvider::OpenAi => Arc::new(
            OpenAiEmbedder::new(
                api_key("OPENAI_API_KEY")?,
                &embedding.model,
                embedding.dimension,
                None,
            )
            .context("failed to build embedder")?,
        ),
    })
}

/// Wire the dataset, model and memory settings into an agent factory.
pub fn build_factory(config: &SimConfig, common: &CommonArgs, journal: &Journal) -> Result<AgentFactory> {
    let tool = DatasetTool::load(&common.data)
        .with_context(|| format!("failed to load dataset from {}", common.data.display()))?;

    Ok(AgentFactory::new(
        build_model(config, journal)?,
        build_embedder(config)?,
        Arc::new(tool),
        journal.clone(),
    )
    .reasoning(config.agent.reasoning_kind()?)
    .memory(config.agent.memory_kind()?)
    .memory_config(config.memory.store_config())
    .max_tokens(config.agent.max_tokens)
    .profile_type_prompt(config.agent.profile_type_prompt.clone()))
}
