//! End-to-end workflow and runner tests with scripted models and an
//! in-memory dataset.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use socsim_agent::{
    AgentError, AgentFactory, DatasetTool, Decision, InteractionTool, ReasoningKind, Review,
    ReviewQuery, RunnerConfig, Task, run_tasks,
};
use socsim_llm::{Completion, HashEmbedder, Journal, LanguageModel, ScriptedModel};
use socsim_store::MemoryKind;

const ANSWER: &str = "stars: 4.5\nreview: Lovely little place.";

fn answering_model() -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::with_responder(|_| {
        Ok(Completion::One(ANSWER.to_owned()))
    }))
}

fn factory(llm: Arc<ScriptedModel>, tool: Arc<dyn InteractionTool>, journal: Journal) -> AgentFactory {
    let llm: Arc<dyn LanguageModel> = llm;
    AgentFactory::new(llm, Arc::new(HashEmbedder::new(1024)), tool, journal)
        .reasoning(ReasoningKind::Io)
        .memory(MemoryKind::Dilu)
}

fn review(user: &str, item: &str, text: &str) -> Review {
    Review {
        user_id: Some(user.to_owned()),
        item_id: Some(item.to_owned()),
        ..Review::new(text)
    }
}

fn dataset() -> Arc<DatasetTool> {
    let users = HashMap::from([("u1".to_owned(), json!({"user_id": "u1", "name": "Ann"}))]);
    let items = HashMap::from([("b1".to_owned(), json!({"item_id": "b1", "name": "Bean There"}))]);
    let reviews = vec![
        review("u2", "b1", "Great coffee and friendly staff."),
        review("u3", "b1", "Too noisy to work."),
        review("u1", "b7", "Great coffee here."),
    ];
    Arc::new(DatasetTool::from_parts(users, items, reviews))
}

// ═══════════════════════════════════════════════════════════════════════
//  Workflow
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn workflow_produces_parsed_decision() {
    let llm = answering_model();
    let journal = Journal::in_memory();
    let agent = factory(llm.clone(), dataset(), journal.clone())
        .build(Some("0"))
        .await
        .unwrap();

    let decision = agent.run(&Task::simulation("u1", "b1")).await;
    assert_eq!(decision.stars, 4.5);
    assert_eq!(decision.review, "Lovely little place.");

    let prompt = &llm.requests()[0].messages[0].content;
    assert!(prompt.contains("\"name\":\"Ann\""));
    assert!(prompt.contains("\"name\":\"Bean There\""));
    assert!(prompt.contains("Others have reviewed this business before:  Great coffee and friendly staff."));

    assert_eq!(journal.events("plan_generated").len(), 1);
    assert_eq!(journal.events("memory_added").len(), 2);
    assert_eq!(journal.events("memory_retrieved")[0]["task_id"], "0");
}

#[tokio::test]
async fn unknown_user_and_item_use_placeholders() {
    let llm = answering_model();
    let agent = factory(llm.clone(), dataset(), Journal::disabled())
        .build(None)
        .await
        .unwrap();

    let decision = agent.run(&Task::simulation("ghost", "nowhere")).await;
    assert_eq!(decision.stars, 4.5);

    let prompt = &llm.requests()[0].messages[0].content;
    assert!(prompt.contains("No user data available"));
    assert!(prompt.contains("No business data available"));
    assert!(prompt.contains("Others have reviewed this business before: \n"));
}

#[tokio::test]
async fn out_of_range_rating_is_kept_and_flagged() {
    let llm = Arc::new(ScriptedModel::new(["stars: 0.5\nreview: Dreadful."]));
    let journal = Journal::in_memory();
    let agent = factory(llm, dataset(), journal.clone())
        .build(Some("1"))
        .await
        .unwrap();

    let decision = agent.run(&Task::simulation("u1", "b1")).await;
    assert_eq!(decision.stars, 0.5);
    assert!(!decision.is_failure());

    let parsed = journal.events("decision_parsed");
    assert_eq!(parsed[0]["data"]["stars_in_range"], false);
}

struct BrokenUsers;

#[async_trait]
impl InteractionTool for BrokenUsers {
    async fn get_user(&self, _: &str) -> socsim_agent::Result<Option<Value>> {
        Err(AgentError::tool("user index offline"))
    }

    async fn get_item(&self, _: &str) -> socsim_agent::Result<Option<Value>> {
        Ok(None)
    }

    async fn get_reviews(&self, _: &ReviewQuery) -> socsim_agent::Result<Vec<Review>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn tool_failure_yields_sentinel() {
    let llm = answering_model();
    let journal = Journal::in_memory();
    let agent = factory(llm.clone(), Arc::new(BrokenUsers), journal.clone())
        .build(Some("3"))
        .await
        .unwrap();

    let decision = agent.run(&Task::simulation("u1", "b1")).await;
    assert_eq!(decision, Decision::failed());
    assert_eq!(decision.stars, 0.0);
    assert_eq!(decision.review, "");
    assert_eq!(llm.call_count(), 0);

    let failed = journal.events("workflow_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["task_id"], "3");
    assert!(failed[0]["data"]["error"].as_str().unwrap().contains("user index offline"));
}

#[tokio::test]
async fn model_failure_yields_sentinel() {
    let agent = factory(Arc::new(ScriptedModel::empty()), dataset(), Journal::disabled())
        .build(None)
        .await
        .unwrap();
    assert!(agent.run(&Task::simulation("u1", "b1")).await.is_failure());
}

// ═══════════════════════════════════════════════════════════════════════
//  Runner
// ═══════════════════════════════════════════════════════════════════════

/// Sleeps in `get_user` (longer for lower user numbers) and records peak
/// concurrency. User `"panic"` panics.
#[derive(Default)]
struct SlowTool {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl InteractionTool for SlowTool {
    async fn get_user(&self, user_id: &str) -> socsim_agent::Result<Option<Value>> {
        if user_id == "panic" {
            panic!("corrupt record");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let n: u64 = user_id.trim_start_matches('u').parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(n * 10))).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(json!({ "user_id": user_id })))
    }

    async fn get_item(&self, _: &str) -> socsim_agent::Result<Option<Value>> {
        Ok(None)
    }

    async fn get_reviews(&self, _: &ReviewQuery) -> socsim_agent::Result<Vec<Review>> {
        Ok(Vec::new())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_keeps_task_order_and_bounds_concurrency() {
    let tool = Arc::new(SlowTool::default());
    let journal = Journal::in_memory();
    let factory = Arc::new(factory(answering_model(), tool.clone(), journal.clone()));

    let tasks: Vec<Task> = (0..6).map(|i| Task::simulation(format!("u{i}"), "b1")).collect();
    let outcomes = run_tasks(tasks, factory, RunnerConfig::new(2)).await;

    let users: Vec<&str> = outcomes.iter().map(|o| o.task.user_id.as_str()).collect();
    assert_eq!(users, vec!["u0", "u1", "u2", "u3", "u4", "u5"]);
    assert!(outcomes.iter().enumerate().all(|(i, o)| o.index == i));
    assert!(outcomes.iter().all(|o| o.decision.stars == 4.5));
    assert!(tool.peak.load(Ordering::SeqCst) <= 2);

    assert_eq!(journal.events("task_start").len(), 6);
    assert_eq!(journal.events("task_complete").len(), 6);
}

#[tokio::test]
async fn panicking_worker_is_reported_as_sentinel() {
    let journal = Journal::in_memory();
    let factory = Arc::new(factory(
        answering_model(),
        Arc::new(SlowTool::default()),
        journal.clone(),
    ));

    let tasks = vec![
        Task::simulation("u5", "b1"),
        Task::simulation("panic", "b1"),
        Task::simulation("u4", "b1"),
    ];
    let outcomes = run_tasks(tasks, factory, RunnerConfig::default()).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].decision.stars, 4.5);
    assert!(outcomes[1].decision.is_failure());
    assert_eq!(outcomes[1].task.user_id, "panic");
    assert_eq!(outcomes[2].decision.stars, 4.5);

    let failed: Vec<_> = journal
        .events("task_complete")
        .into_iter()
        .filter(|e| e["data"]["failed"] == true)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["task_id"], "1");
}

#[tokio::test]
async fn empty_task_list_returns_nothing() {
    let factory = Arc::new(factory(answering_model(), dataset(), Journal::disabled()));
    assert!(run_tasks(Vec::new(), factory, RunnerConfig::new(4)).await.is_empty());
}
