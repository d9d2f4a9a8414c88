//! Review-simulation agents.
//!
//! A run loads [`Task`]s, builds one [`SimulationAgent`] per task through an
//! [`AgentFactory`], and executes them on a bounded pool with
//! [`run_tasks`]. Each agent plans, fetches data through an
//! [`InteractionTool`], consults its own episodic memory, asks a
//! [`Reasoner`] for an answer and parses it into a [`Decision`].

pub mod config;
pub mod error;
pub mod parser;
pub mod planning;
pub mod prompts;
pub mod reasoning;
pub mod runner;
pub mod task;
pub mod tool;
pub mod vote;
pub mod workflow;

pub use config::{EmbeddingProvider, SimConfig};
pub use error::{AgentError, Result};
pub use parser::{Decision, DefaultReason, FieldOutcome, ParsedDecision, parse_decision};
pub use planning::{PlanStep, Planner, ToolUse};
pub use reasoning::{FALLBACK_ANSWER, Reasoner, ReasoningKind};
pub use runner::{RunnerConfig, TaskOutcome, run_tasks};
pub use task::{Task, TaskKind, load_tasks};
pub use tool::{DatasetTool, InteractionTool, Review, ReviewQuery};
pub use workflow::{AgentFactory, NO_BUSINESS_DATA, NO_USER_DATA, SimulationAgent};
