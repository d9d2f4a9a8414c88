//! Reasoning strategies.
//!
//! Every strategy takes the task text and returns raw model text; the
//! [`crate::parser`] turns that into a decision. Strategies differ only in
//! how many model calls they make and how they pick among the answers:
//!
//! - `Io`: one call.
//! - `Cot`: one call, step-by-step prompt.
//! - `CotSc`: five samples, most frequent exact answer wins.
//! - `Tot`: three candidates, then five voters pick one.
//! - `Dilu`: one call with a persona system message.
//! - `SelfRefine`: answer, then critique and revise.
//! - `StepBack`: extract a guiding principle, then solve with it.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use socsim_llm::{CallSite, ChatRequest, Journal, LanguageModel, Message};

use crate::error::{AgentError, Result};
use crate::prompts;
use crate::vote;

/// Returned when a strategy ends up with no candidate at all.
pub const FALLBACK_ANSWER: &str = "stars: 3.0\nreview: Unable to generate review.";

/// Case-insensitive marker that makes TOT keep its first candidate as-is.
const DELIBERATION_MARKER: &str = "think";

const TEMPERATURE: f32 = 0.1;
const CRITIQUE_TEMPERATURE: f32 = 0.0;
const VOTE_TEMPERATURE: f32 = 0.7;

const SELF_CONSISTENCY_SAMPLES: u32 = 5;
const TOT_CANDIDATES: u32 = 3;
const TOT_VOTERS: u32 = 5;

const REASON_SITE: CallSite = CallSite::new("reasoning", "reason");
const VOTE_SITE: CallSite = CallSite::new("reasoning", "get_votes");
const REFINE_SITE: CallSite = CallSite::new("reasoning", "refine");
const STEP_BACK_SITE: CallSite = CallSite::new("reasoning", "step_back");

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasoningKind {
    Io,
    Cot,
    CotSc,
    Tot,
    Dilu,
    SelfRefine,
    StepBack,
}

impl ReasoningKind {
    /// Config / CLI spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Cot => "cot",
            Self::CotSc => "cot-sc",
            Self::Tot => "tot",
            Self::Dilu => "dilu",
            Self::SelfRefine => "self-refine",
            Self::StepBack => "step-back",
        }
    }

    /// Label written to diagnostics.
    fn label(self) -> &'static str {
        match self {
            Self::Io => "IO",
            Self::Cot => "COT",
            Self::CotSc => "COT-SC",
            Self::Tot => "TOT",
            Self::Dilu => "DILU",
            Self::SelfRefine => "SelfRefine",
            Self::StepBack => "StepBack",
        }
    }
}

impl std::fmt::Display for ReasoningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReasoningKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "io" => Ok(Self::Io),
            "cot" => Ok(Self::Cot),
            "cot-sc" | "cotsc" => Ok(Self::CotSc),
            "tot" => Ok(Self::Tot),
            "dilu" => Ok(Self::Dilu),
            "self-refine" | "selfrefine" => Ok(Self::SelfRefine),
            "step-back" | "stepback" => Ok(Self::StepBack),
            other => Err(AgentError::config(format!("unknown reasoning kind `{other}`"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Runs one reasoning strategy against a model.
#[derive(Clone)]
pub struct Reasoner {
    kind: ReasoningKind,
    llm: Arc<dyn LanguageModel>,
    journal: Journal,
    profile_type_prompt: String,
    max_tokens: u32,
    task_id: Option<String>,
}

impl std::fmt::Debug for Reasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reasoner")
            .field("kind", &self.kind)
            .field("model", &self.llm.model_name())
            .finish_non_exhaustive()
    }
}

impl Reasoner {
    pub fn new(kind: ReasoningKind, llm: Arc<dyn LanguageModel>, journal: Journal) -> Self {
        Self {
            kind,
            llm,
            journal,
            profile_type_prompt: String::new(),
            max_tokens: socsim_llm::DEFAULT_MAX_TOKENS,
            task_id: None,
        }
    }

    /// Persona text placed before the task description. Empty by default.
    pub fn with_profile_type_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.profile_type_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn kind(&self) -> ReasoningKind {
        self.kind
    }

    /// Produce raw answer text for `task_description`.
    ///
    /// `feedback` is accepted for interface compatibility and currently
    /// ignored by every strategy. Model failures propagate.
    pub async fn reason(&self, task_description: &str, feedback: &str) -> Result<String> {
        let task = if self.profile_type_prompt.is_empty() {
            task_description.to_owned()
        } else {
            format!("{}\n{task_description}", self.profile_type_prompt)
        };
        let examples = prompts::examples_block();

        let mut started = json!({
            "reasoning_type": self.kind.label(),
            "task_length": task.chars().count(),
            "has_feedback": !feedback.is_empty(),
            "examples_count": prompts::EXEMPLARS.len(),
        });
        match self.kind {
            ReasoningKind::Tot => started["n_candidates"] = json!(TOT_CANDIDATES),
            ReasoningKind::CotSc => started["n_candidates"] = json!(SELF_CONSISTENCY_SAMPLES),
            _ => {}
        }
        self.diagnostic(REASON_SITE, "reasoning_started", started);
        debug!(kind = %self.kind, task_len = task.len(), "reasoning started");

        let result = match self.kind {
            ReasoningKind::Io => self.single(prompts::solve_prompt(false, &examples, &task)).await?,
            ReasoningKind::Cot => self.single(prompts::solve_prompt(true, &examples, &task)).await?,
            ReasoningKind::CotSc => self.self_consistency(&examples, &task).await?,
            ReasoningKind::Tot => self.tree_of_thought(&examples, &task).await?,
            ReasoningKind::Dilu => self.dilu(&examples, &task).await?,
            ReasoningKind::SelfRefine => {
                let draft = self.single(prompts::solve_prompt(true, &examples, &task)).await?;
                self.refine(&draft).await?
            }
            ReasoningKind::StepBack => {
                let principle = self.step_back(&task).await?;
                self.single(prompts::principled_solve_prompt(&examples, &principle, &task))
                    .await?
            }
        };

        self.diagnostic(
            REASON_SITE,
            "reasoning_completed",
            json!({
                "reasoning_type": self.kind.label(),
                "result_length": result.chars().count(),
            }),
        );
        Ok(result)
    }

    // ── strategies ───────────────────────────────────────────────────

    fn request(&self, messages: Vec<Message>, site: CallSite) -> ChatRequest {
        ChatRequest::new(messages)
            .temperature(TEMPERATURE)
            .max_tokens(self.max_tokens)
            .site(site)
    }

    async fn single(&self, prompt: String) -> Result<String> {
        let request = self.request(vec![Message::user(prompt)], REASON_SITE);
        Ok(self.llm.call(&request).await?.into_text())
    }

    async fn dilu(&self, examples: &str, task: &str) -> Result<String> {
        let request = self.request(
            vec![
                Message::system(prompts::DILU_SYSTEM),
                Message::user(prompts::dilu_user_prompt(examples, task)),
            ],
            REASON_SITE,
        );
        Ok(self.llm.call(&request).await?.into_text())
    }

    async fn self_consistency(&self, examples: &str, task: &str) -> Result<String> {
        let request = self
            .request(
                vec![Message::user(prompts::solve_prompt(true, examples, task))],
                REASON_SITE,
            )
            .n(SELF_CONSISTENCY_SAMPLES);
        let samples = self.llm.call(&request).await?.into_candidates();
        self.candidates_generated(samples.len());

        Ok(vote::majority(&samples)
            .unwrap_or(FALLBACK_ANSWER)
            .to_owned())
    }

    async fn tree_of_thought(&self, examples: &str, task: &str) -> Result<String> {
        let request = self
            .request(
                vec![Message::user(prompts::solve_prompt(true, examples, task))],
                REASON_SITE,
            )
            .n(TOT_CANDIDATES);
        let candidates = self.llm.call(&request).await?.into_candidates();
        self.candidates_generated(candidates.len());

        let Some(first) = candidates.first() else {
            return Ok(FALLBACK_ANSWER.to_owned());
        };
        if first.to_lowercase().contains(DELIBERATION_MARKER) {
            self.diagnostic(
                VOTE_SITE,
                "vote_selection",
                json!({
                    "reasoning_type": self.kind.label(),
                    "short_circuit": true,
                    "selected_id": 0,
                }),
            );
            return Ok(first.clone());
        }

        self.vote(examples, task, candidates).await
    }

    async fn vote(&self, examples: &str, task: &str, mut candidates: Vec<String>) -> Result<String> {
        let request = self
            .request(
                vec![Message::user(prompts::vote_prompt(examples, task, &candidates))],
                VOTE_SITE,
            )
            .temperature(VOTE_TEMPERATURE)
            .n(TOT_VOTERS);
        let ballots = self.llm.call(&request).await?.into_candidates();
        let tally = vote::tally(&ballots, candidates.len());

        for pos in &tally.unparsed {
            let ballot = &ballots[*pos];
            warn!(ballot = %ballot, "vote did not name a candidate");
            self.diagnostic(
                VOTE_SITE,
                "vote_unparsed",
                json!({ "ballot_index": pos, "ballot": ballot }),
            );
        }

        let Some(selected) = vote::select(&tally.counts) else {
            return Ok(FALLBACK_ANSWER.to_owned());
        };
        self.diagnostic(
            VOTE_SITE,
            "vote_selection",
            json!({
                "reasoning_type": self.kind.label(),
                "vote_results": tally.counts,
                "selected_id": selected,
                "votes_count": ballots.len(),
                "unparsed_count": tally.unparsed.len(),
                "out_of_range_count": tally.out_of_range,
            }),
        );
        Ok(candidates.swap_remove(selected))
    }

    async fn refine(&self, draft: &str) -> Result<String> {
        let request = self
            .request(vec![Message::user(prompts::refine_prompt(draft))], REFINE_SITE)
            .temperature(CRITIQUE_TEMPERATURE);
        Ok(self.llm.call(&request).await?.into_text())
    }

    async fn step_back(&self, task: &str) -> Result<String> {
        let request = self.request(
            vec![Message::user(prompts::step_back_prompt(task))],
            STEP_BACK_SITE,
        );
        Ok(self.llm.call(&request).await?.into_text())
    }

    // ── diagnostics ──────────────────────────────────────────────────

    fn candidates_generated(&self, count: usize) {
        self.diagnostic(
            REASON_SITE,
            "reasoning_candidates_generated",
            json!({ "reasoning_type": self.kind.label(), "candidates_count": count }),
        );
    }

    fn diagnostic(&self, site: CallSite, event_type: &str, data: serde_json::Value) {
        self.journal
            .diagnostic(site, event_type, self.task_id.as_deref(), data);
    }
}
