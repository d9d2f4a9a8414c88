//! Episodic memory over past trajectories.
//!
//! One [`EpisodicMemory`] belongs to one task workflow. Records are only ever
//! appended; retrieval policy depends on [`MemoryKind`]:
//!
//! | kind         | k | policy                                             |
//! |--------------|---|----------------------------------------------------|
//! | `Dilu`       | 1 | nearest trajectory, verbatim                       |
//! | `Generative` | 3 | LLM scores relevance 1-10, first max wins          |
//! | `TaskPlan`   | 1 | LLM derives a plan from the nearest trajectory     |
//! | `Voyager`    | 1 | match on LLM summary, return original trajectory   |

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::json;
use tracing::{debug, instrument};

use socsim_llm::{CallSite, ChatRequest, Embedder, Journal, LanguageModel};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::index::{ScoredDocument, TrajectoryDocument, TrajectoryMetadata, VectorIndex};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prefix of every task-plan retrieval.
pub const PLAN_BANNER: &str = "Plan from successful attempt in similar task:\n";

/// Marker that turns an [`EpisodicMemory::observe`] call into an insert.
pub const REVIEW_MARKER: &str = "review:";

/// Queries are cut to this many characters in diagnostics.
const QUERY_LOG_CHARS: usize = 100;

const TEMPERATURE: f32 = 0.1;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

const ADD_SITE: CallSite = CallSite::new("memory", "add");
const RETRIEVE_SITE: CallSite = CallSite::new("memory", "retrieve");
const INIT_SITE: CallSite = CallSite::new("memory", "init");

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Retrieval policy of a memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    Dilu,
    Generative,
    TaskPlan,
    Voyager,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dilu => "dilu",
            Self::Generative => "generative",
            Self::TaskPlan => "tp",
            Self::Voyager => "voyager",
        }
    }

    /// How many neighbours retrieval considers.
    fn top_k(self) -> usize {
        match self {
            Self::Generative => 3,
            Self::Dilu | Self::TaskPlan | Self::Voyager => 1,
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dilu" => Ok(Self::Dilu),
            "generative" => Ok(Self::Generative),
            "tp" | "task-plan" | "taskplan" => Ok(Self::TaskPlan),
            "voyager" => Ok(Self::Voyager),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown memory kind: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Where memory stores live.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// When set, each store gets `<root>/<kind>/<uuid>.sqlite3`; otherwise
    /// stores are in-memory SQLite.
    pub root_dir: Option<PathBuf>,
}

impl MemoryStoreConfig {
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: Some(root.into()),
        }
    }

    fn store_path(&self, kind: MemoryKind) -> Option<PathBuf> {
        self.root_dir.as_ref().map(|root| {
            root.join(kind.as_str())
                .join(format!("{}.sqlite3", uuid::Uuid::new_v4()))
        })
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// A per-task episodic memory store.
#[derive(Clone)]
pub struct EpisodicMemory {
    kind: MemoryKind,
    index: VectorIndex,
    llm: Arc<dyn LanguageModel>,
    journal: Journal,
    task_id: Option<String>,
}

impl std::fmt::Debug for EpisodicMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodicMemory")
            .field("kind", &self.kind)
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

impl EpisodicMemory {
    /// Create an empty store. Any state already at the target path is
    /// discarded.
    pub async fn open(
        kind: MemoryKind,
        config: &MemoryStoreConfig,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        journal: Journal,
    ) -> StoreResult<Self> {
        let path = config.store_path(kind);
        let db = match &path {
            Some(path) => Database::open_fresh(path).await?,
            None => Database::open_in_memory_and_migrate().await?,
        };
        let db_path = path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_owned());

        debug!(memory_type = %kind, db_path = %db_path, "memory initialized");
        journal.diagnostic(
            INIT_SITE,
            "memory_initialized",
            None,
            json!({ "memory_type": kind.as_str(), "db_path": db_path }),
        );

        Ok(Self {
            kind,
            index: VectorIndex::new(db, embedder),
            llm,
            journal,
            task_id: None,
        })
    }

    /// Tag subsequent diagnostics with a task id.
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.index.count().await
    }

    fn diagnostic(&self, site: CallSite, event_type: &str, data: serde_json::Value) {
        self.journal
            .diagnostic(site, event_type, self.task_id.as_deref(), data);
    }

    /// Combined entry point: text containing `"review:"` is stored (with
    /// every marker removed) and yields `None`; anything else is a retrieval
    /// query.
    pub async fn observe(&self, situation: &str) -> StoreResult<Option<String>> {
        if situation.contains(REVIEW_MARKER) {
            self.add(&situation.replace(REVIEW_MARKER, "")).await?;
            Ok(None)
        } else {
            self.retrieve(situation).await.map(Some)
        }
    }

    // ── insert ───────────────────────────────────────────────────────

    /// Store a trajectory. Voyager stores first summarize it with the model.
    #[instrument(skip(self, trajectory), fields(kind = %self.kind, len = trajectory.len()))]
    pub async fn add(&self, trajectory: &str) -> StoreResult<()> {
        let mut data = json!({
            "memory_type": self.kind.as_str(),
            "content_length": trajectory.chars().count(),
        });

        let doc = match self.kind {
            MemoryKind::Dilu | MemoryKind::Generative | MemoryKind::TaskPlan => TrajectoryDocument {
                content: trajectory.to_owned(),
                metadata: TrajectoryMetadata {
                    task_name: Some(trajectory.to_owned()),
                    task_description: None,
                    task_trajectory: Some(trajectory.to_owned()),
                },
            },
            MemoryKind::Voyager => {
                let summary = self.summarize(trajectory).await?;
                data["summary_length"] = json!(summary.chars().count());
                TrajectoryDocument {
                    content: summary.clone(),
                    metadata: TrajectoryMetadata {
                        task_name: None,
                        task_description: Some(summary),
                        task_trajectory: Some(trajectory.to_owned()),
                    },
                }
            }
        };

        self.index.add(doc).await?;
        data["memory_count_after"] = json!(self.index.count().await?);
        self.diagnostic(ADD_SITE, "memory_added", data);
        Ok(())
    }

    async fn summarize(&self, trajectory: &str) -> StoreResult<String> {
        let request = ChatRequest::user(voyager_summary_prompt(trajectory))
            .temperature(TEMPERATURE)
            .site(ADD_SITE);
        Ok(self.llm.call(&request).await?.into_text())
    }

    // ── retrieval ────────────────────────────────────────────────────

    /// Retrieve context for `query`. An empty store yields `""`.
    ///
    /// Records without a trajectory are skipped. Model and embedder failures
    /// propagate.
    #[instrument(skip(self, query), fields(kind = %self.kind))]
    pub async fn retrieve(&self, query: &str) -> StoreResult<String> {
        let memory_count = self.index.count().await?;
        let logged_query = truncate_chars(query, QUERY_LOG_CHARS);

        if memory_count == 0 {
            self.diagnostic(
                RETRIEVE_SITE,
                "memory_retrieval_empty",
                json!({ "memory_type": self.kind.as_str(), "query": logged_query }),
            );
            return Ok(String::new());
        }

        let hits = self
            .index
            .similarity_search_with_score(query, self.kind.top_k())
            .await?;

        match self.kind {
            MemoryKind::Dilu | MemoryKind::Voyager => {
                let result = join_trajectories(&hits);
                self.diagnostic(
                    RETRIEVE_SITE,
                    "memory_retrieved",
                    json!({
                        "memory_type": self.kind.as_str(),
                        "query": logged_query,
                        "memory_count": memory_count,
                        "similarity_score": hits.first().map(|h| h.score),
                        "result_length": result.chars().count(),
                    }),
                );
                Ok(result)
            }
            MemoryKind::Generative => self.retrieve_generative(query, &hits).await,
            MemoryKind::TaskPlan => self.retrieve_plan(query, &hits, memory_count).await,
        }
    }

    async fn retrieve_generative(&self, query: &str, hits: &[ScoredDocument]) -> StoreResult<String> {
        let mut scored: Vec<(&str, u32, f32)> = Vec::with_capacity(hits.len());

        for hit in hits {
            let Some(trajectory) = hit.document.trajectory() else {
                continue;
            };
            let request = ChatRequest::user(importance_prompt(trajectory, query))
                .temperature(TEMPERATURE)
                .stop(["\n"])
                .site(RETRIEVE_SITE);
            let response = self.llm.call(&request).await?.into_text();
            let score = leading_score(&response);

            self.diagnostic(
                RETRIEVE_SITE,
                "importance_scored",
                json!({
                    "memory_type": self.kind.as_str(),
                    "score": score,
                    "trajectory_index": scored.len(),
                    "similarity_score": hit.score,
                }),
            );
            scored.push((trajectory, score, hit.score));
        }

        let scores: Vec<u32> = scored.iter().map(|(_, s, _)| *s).collect();
        let similarities: Vec<f32> = scored.iter().map(|(_, _, sim)| *sim).collect();
        let Some(selected) = first_max(&scores) else {
            return Ok(String::new());
        };

        self.diagnostic(
            RETRIEVE_SITE,
            "memory_selected",
            json!({
                "memory_type": self.kind.as_str(),
                "selected_index": selected,
                "max_score": scores[selected],
                "all_scores": scores,
                "similarity_scores": similarities,
            }),
        );
        Ok(scored[selected].0.to_owned())
    }

    async fn retrieve_plan(
        &self,
        query: &str,
        hits: &[ScoredDocument],
        memory_count: usize,
    ) -> StoreResult<String> {
        let mut plans = Vec::with_capacity(hits.len());
        for trajectory in hits.iter().filter_map(|h| h.document.trajectory()) {
            let request = ChatRequest::user(plan_prompt(trajectory, query))
                .temperature(TEMPERATURE)
                .site(RETRIEVE_SITE);
            plans.push(self.llm.call(&request).await?.into_text());
        }

        let result = format!("{PLAN_BANNER}{}", plans.join("\n"));
        self.diagnostic(
            RETRIEVE_SITE,
            "memory_retrieved",
            json!({
                "memory_type": self.kind.as_str(),
                "query": truncate_chars(query, QUERY_LOG_CHARS),
                "memory_count": memory_count,
                "similarity_score": hits.first().map(|h| h.score),
                "plan_count": plans.len(),
                "result_length": result.chars().count(),
            }),
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn join_trajectories(hits: &[ScoredDocument]) -> String {
    hits.iter()
        .filter_map(|h| h.document.trajectory())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First run of digits in `response`, or 0 when there is none (or it does
/// not fit).
pub fn leading_score(response: &str) -> u32 {
    SCORE_RE
        .find(response)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Index of the first maximum.
fn first_max(scores: &[u32]) -> Option<usize> {
    let max = scores.iter().copied().max()?;
    scores.iter().position(|s| *s == max)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn importance_prompt(trajectory: &str, query: &str) -> String {
    format!(
        "You will be given a successful case where you successfully complete the task. Then you will be given an ongoing task. Do not summarize these two cases, but rather evaluate how relevant and helpful the successful case is for the ongoing task, on a scale of 1-10.\n\
         Success Case:\n{trajectory}\n\
         Ongoing task:\n{query}\n\
         Your output format should be:\n\
         Score: "
    )
}

fn plan_prompt(trajectory: &str, query: &str) -> String {
    format!(
        "You will be given a successful case where you successfully complete the task. Then you will be given an ongoing task. Do not summarize these two cases, but rather use the successful case to think about the strategy and path you took to attempt to complete the task in the ongoing task. Devise a concise, new plan of action that accounts for your task with reference to specific actions that you should have taken. You will need this later to solve the task. Give your plan after \"Plan\".\n\
         Success Case:\n{trajectory}\n\
         Ongoing task:\n{query}\n\
         Plan:\n"
    )
}

fn voyager_summary_prompt(trajectory: &str) -> String {
    format!(
        "You are a helpful assistant that writes a description of the task resolution trajectory.\n\n\
         1) Try to summarize the trajectory in no more than 6 sentences.\n\
         2) Your response should be a single line of text.\n\n\
         Trajectory:\n{trajectory}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse_and_display() {
        assert_eq!("tp".parse::<MemoryKind>().unwrap(), MemoryKind::TaskPlan);
        assert_eq!("Voyager".parse::<MemoryKind>().unwrap(), MemoryKind::Voyager);
        assert!("chroma".parse::<MemoryKind>().is_err());
        assert_eq!(MemoryKind::Generative.to_string(), "generative");
    }

    #[test]
    fn score_extraction() {
        assert_eq!(leading_score("Score: 8"), 8);
        assert_eq!(leading_score("7/10 because"), 7);
        assert_eq!(leading_score("very relevant"), 0);
        assert_eq!(leading_score("99999999999999999999"), 0);
    }

    #[test]
    fn first_max_prefers_earliest() {
        assert_eq!(first_max(&[3, 7, 7, 1]), Some(1));
        assert_eq!(first_max(&[0, 0]), Some(0));
        assert_eq!(first_max(&[]), None);
    }

    #[test]
    fn truncation_counts_chars() {
        let query = "é".repeat(150);
        assert_eq!(truncate_chars(&query, QUERY_LOG_CHARS).chars().count(), 100);
    }

    #[test]
    fn prompts_embed_inputs() {
        let p = importance_prompt("past", "now");
        assert!(p.contains("Success Case:\npast\nOngoing task:\nnow\n"));
        assert!(p.ends_with("Score: "));
        assert!(plan_prompt("past", "now").ends_with("Plan:\n"));
        assert!(voyager_summary_prompt("t").ends_with("Trajectory:\nt"));
    }

    #[test]
    fn store_path_layout() {
        let config = MemoryStoreConfig::on_disk("/tmp/db");
        let path = config.store_path(MemoryKind::Voyager).unwrap();
        assert!(path.starts_with("/tmp/db/voyager"));
        assert_eq!(path.extension().unwrap(), "sqlite3");
        assert!(MemoryStoreConfig::default().store_path(MemoryKind::Dilu).is_none());
    }
}
