//! Per-task review simulation.
//!
//! A [`SimulationAgent`] walks one task through a fixed sequence:
//! plan, fetch the user and the business, seed memory with the business's
//! reviews, retrieve a review similar to the user's own, build the prompt,
//! reason, and parse. Any error along the way becomes the sentinel
//! [`Decision::failed`]; [`SimulationAgent::run`] never fails.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use socsim_llm::{CallSite, Embedder, Journal, LanguageModel};
use socsim_store::{EpisodicMemory, MemoryKind, MemoryStoreConfig, REVIEW_MARKER};

use crate::error::Result;
use crate::parser::{Decision, parse_decision};
use crate::planning::{Planner, ToolUse};
use crate::prompts;
use crate::reasoning::{Reasoner, ReasoningKind};
use crate::task::Task;
use crate::tool::{InteractionTool, ReviewQuery};

/// Stands in for a user the dataset does not know.
pub const NO_USER_DATA: &str = "No user data available";

/// Stands in for a business the dataset does not know.
pub const NO_BUSINESS_DATA: &str = "No business data available";

const WORKFLOW_SITE: CallSite = CallSite::new("workflow", "workflow");

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Simulates one user reviewing one business.
pub struct SimulationAgent {
    memory: EpisodicMemory,
    reasoner: Reasoner,
    planner: Planner,
    tool: Arc<dyn InteractionTool>,
    journal: Journal,
    task_id: Option<String>,
}

impl std::fmt::Debug for SimulationAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationAgent")
            .field("memory", &self.memory)
            .field("reasoner", &self.reasoner)
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

impl SimulationAgent {
    pub fn new(
        memory: EpisodicMemory,
        reasoner: Reasoner,
        tool: Arc<dyn InteractionTool>,
        journal: Journal,
    ) -> Self {
        Self {
            memory,
            reasoner,
            planner: Planner::new(journal.clone()),
            tool,
            journal,
            task_id: None,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        self.memory = self.memory.with_task_id(task_id.clone());
        self.reasoner = self.reasoner.with_task_id(task_id.clone());
        self.task_id = Some(task_id);
        self
    }

    /// Run the workflow, turning any failure into the sentinel decision.
    pub async fn run(&self, task: &Task) -> Decision {
        match self.try_run(task).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    task_id = ?self.task_id,
                    user_id = %task.user_id,
                    item_id = %task.item_id,
                    error = %e,
                    "workflow failed"
                );
                self.journal.diagnostic(
                    WORKFLOW_SITE,
                    "workflow_failed",
                    self.task_id.as_deref(),
                    json!({
                        "user_id": task.user_id,
                        "item_id": task.item_id,
                        "error": e.to_string(),
                    }),
                );
                Decision::failed()
            }
        }
    }

    /// The workflow proper. Errors propagate.
    pub async fn try_run(&self, task: &Task) -> Result<Decision> {
        let plan = self.planner.plan(task, self.task_id.as_deref());

        let mut user = NO_USER_DATA.to_owned();
        let mut business = NO_BUSINESS_DATA.to_owned();
        for step in &plan {
            match &step.tool {
                ToolUse::FetchUser(id) => {
                    if let Some(record) = self.tool.get_user(id).await? {
                        user = render(&record);
                    }
                }
                ToolUse::FetchItem(id) => {
                    if let Some(record) = self.tool.get_item(id).await? {
                        business = render(&record);
                    }
                }
            }
        }

        let item_reviews = self
            .tool
            .get_reviews(&ReviewQuery::for_item(&task.item_id))
            .await?;
        for review in &item_reviews {
            self.memory
                .observe(&format!("{REVIEW_MARKER} {}", review.text))
                .await?;
        }
        debug!(seeded = item_reviews.len(), "memory seeded with item reviews");

        let user_reviews = self
            .tool
            .get_reviews(&ReviewQuery::for_user(&task.user_id))
            .await?;
        let similar_review = match user_reviews.first() {
            Some(review) => self.memory.observe(&review.text).await?.unwrap_or_default(),
            None => String::new(),
        };

        let prompt = prompts::simulation_task_prompt(&user, &business, &similar_review);
        let raw = self.reasoner.reason(&prompt, "").await?;
        let parsed = parse_decision(Some(&raw));
        let in_range = (1.0..=5.0).contains(&parsed.decision.stars);
        if !in_range {
            warn!(
                task_id = ?self.task_id,
                stars = parsed.decision.stars,
                "rating outside 1-5"
            );
        }

        self.journal.diagnostic(
            WORKFLOW_SITE,
            "decision_parsed",
            self.task_id.as_deref(),
            json!({
                "stars": parsed.decision.stars,
                "stars_in_range": in_range,
                "review_length": parsed.decision.review.chars().count(),
                "stars_outcome": parsed.stars,
                "review_outcome": parsed.review,
            }),
        );
        Ok(parsed.decision)
    }
}

/// Records are embedded in the prompt as compact JSON.
fn render(record: &Value) -> String {
    match record {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Everything needed to build a fresh agent for each task.
#[derive(Clone)]
pub struct AgentFactory {
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub tool: Arc<dyn InteractionTool>,
    pub journal: Journal,
    pub reasoning: ReasoningKind,
    pub memory: MemoryKind,
    pub memory_config: MemoryStoreConfig,
    pub max_tokens: u32,
    pub profile_type_prompt: String,
}

impl AgentFactory {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        tool: Arc<dyn InteractionTool>,
        journal: Journal,
    ) -> Self {
        Self {
            llm,
            embedder,
            tool,
            journal,
            reasoning: ReasoningKind::Cot,
            memory: MemoryKind::Dilu,
            memory_config: MemoryStoreConfig::default(),
            max_tokens: socsim_llm::DEFAULT_MAX_TOKENS,
            profile_type_prompt: String::new(),
        }
    }

    pub fn reasoning(mut self, kind: ReasoningKind) -> Self {
        self.reasoning = kind;
        self
    }

    pub fn memory(mut self, kind: MemoryKind) -> Self {
        self.memory = kind;
        self
    }

    pub fn memory_config(mut self, config: MemoryStoreConfig) -> Self {
        self.memory_config = config;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn profile_type_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.profile_type_prompt = prompt.into();
        self
    }

    /// Build an agent with its own, empty memory store.
    pub async fn build(&self, task_id: Option<&str>) -> Result<SimulationAgent> {
        let memory = EpisodicMemory::open(
            self.memory,
            &self.memory_config,
            Arc::clone(&self.llm),
            Arc::clone(&self.embedder),
            self.journal.clone(),
        )
        .await?;
        let reasoner = Reasoner::new(self.reasoning, Arc::clone(&self.llm), self.journal.clone())
            .with_max_tokens(self.max_tokens)
            .with_profile_type_prompt(self.profile_type_prompt.clone());

        let agent = SimulationAgent::new(memory, reasoner, Arc::clone(&self.tool), self.journal.clone());
        Ok(match task_id {
            Some(id) => agent.with_task_id(id),
            None => agent,
        })
    }

    /// Build a fresh agent and run `task` on it. Never fails.
    pub async fn run_task(&self, task: &Task, task_id: Option<&str>) -> Decision {
        match self.build(task_id).await {
            Ok(agent) => {
                info!(task_id = ?task_id, reasoning = %self.reasoning, memory = %self.memory, "agent ready");
                agent.run(task).await
            }
            Err(e) => {
                error!(task_id = ?task_id, error = %e, "failed to build agent");
                self.journal.diagnostic(
                    WORKFLOW_SITE,
                    "workflow_failed",
                    task_id,
                    json!({
                        "user_id": task.user_id,
                        "item_id": task.item_id,
                        "error": e.to_string(),
                    }),
                );
                Decision::failed()
            }
        }
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("model", &self.llm.model_name())
            .field("reasoning", &self.reasoning)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}
