//! Fixed two-step plan for the review workflow.

use serde::Serialize;
use serde_json::json;

use socsim_llm::{CallSite, Journal};

use crate::task::Task;

const PLAN_SITE: CallSite = CallSite::new("planning", "plan");

/// Which lookup a plan step performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", content = "id", rename_all = "snake_case")]
pub enum ToolUse {
    FetchUser(String),
    FetchItem(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub description: String,
    pub reasoning_instruction: String,
    pub tool: ToolUse,
}

/// Produces the plan for a task. The plan never depends on the model.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    journal: Journal,
}

impl Planner {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }

    pub fn plan(&self, task: &Task, task_id: Option<&str>) -> Vec<PlanStep> {
        let steps = vec![
            PlanStep {
                description: "First I need to find user information".to_owned(),
                reasoning_instruction: "None".to_owned(),
                tool: ToolUse::FetchUser(task.user_id.clone()),
            },
            PlanStep {
                description: "Next, I need to find business information".to_owned(),
                reasoning_instruction: "None".to_owned(),
                tool: ToolUse::FetchItem(task.item_id.clone()),
            },
        ];

        self.journal.diagnostic(
            PLAN_SITE,
            "plan_generated",
            task_id,
            json!({ "steps": steps, "step_count": steps.len() }),
        );
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_fetches_user_then_item() {
        let journal = Journal::in_memory();
        let plan = Planner::new(journal.clone()).plan(&Task::simulation("u1", "b9"), Some("7"));

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].tool, ToolUse::FetchUser("u1".into()));
        assert_eq!(plan[1].tool, ToolUse::FetchItem("b9".into()));
        assert!(plan.iter().all(|s| s.reasoning_instruction == "None"));

        let events = journal.events("plan_generated");
        assert_eq!(events[0]["task_id"], "7");
        assert_eq!(events[0]["data"]["steps"][1]["tool"]["tool"], "fetch_item");
    }
}
