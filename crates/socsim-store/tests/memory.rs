//! Integration tests for the episodic memory variants.
//!
//! Models are scripted and embeddings come from the local hash encoder, so
//! these run without network access.

use std::sync::Arc;

use socsim_llm::{Completion, HashEmbedder, Journal, LanguageModel, LlmError, ScriptedModel};
use socsim_store::{EpisodicMemory, MemoryKind, MemoryStoreConfig, PLAN_BANNER};

const ALL_KINDS: [MemoryKind; 4] = [
    MemoryKind::Dilu,
    MemoryKind::Generative,
    MemoryKind::TaskPlan,
    MemoryKind::Voyager,
];

async fn memory(kind: MemoryKind, llm: Arc<ScriptedModel>, journal: Journal) -> EpisodicMemory {
    let llm: Arc<dyn LanguageModel> = llm;
    EpisodicMemory::open(
        kind,
        &MemoryStoreConfig::default(),
        llm,
        Arc::new(HashEmbedder::new(1024)),
        journal,
    )
    .await
    .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
//  Empty store
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn empty_store_retrieves_empty_string_for_every_kind() {
    for kind in ALL_KINDS {
        let journal = Journal::in_memory();
        let llm = Arc::new(ScriptedModel::empty());
        let mem = memory(kind, llm.clone(), journal.clone()).await;

        assert_eq!(mem.retrieve("anything at all").await.unwrap(), "", "{kind}");
        assert_eq!(llm.call_count(), 0, "{kind} must not call the model");

        let events = journal.events("memory_retrieval_empty");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["data"]["memory_type"], kind.as_str());
    }
}

#[tokio::test]
async fn empty_store_query_is_truncated_in_diagnostics() {
    let journal = Journal::in_memory();
    let mem = memory(MemoryKind::Dilu, Arc::new(ScriptedModel::empty()), journal.clone()).await;

    mem.retrieve(&"q".repeat(250)).await.unwrap();
    let query = journal.events("memory_retrieval_empty")[0]["data"]["query"]
        .as_str()
        .unwrap()
        .to_owned();
    assert_eq!(query.len(), 100);
}

// ═══════════════════════════════════════════════════════════════════════
//  Insertion
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn adding_same_trajectory_twice_counts_twice() {
    let mem = memory(MemoryKind::Dilu, Arc::new(ScriptedModel::empty()), Journal::in_memory()).await;

    mem.add("The room was dirty.").await.unwrap();
    let before = mem.count().await.unwrap();
    mem.add("The room was dirty.").await.unwrap();
    mem.add("The room was dirty.").await.unwrap();
    assert_eq!(mem.count().await.unwrap(), before + 2);
}

#[tokio::test]
async fn add_emits_memory_added() {
    let journal = Journal::in_memory();
    let mem = memory(MemoryKind::Generative, Arc::new(ScriptedModel::empty()), journal.clone()).await;

    mem.add("abc").await.unwrap();
    let added = journal.events("memory_added");
    assert_eq!(added.len(), 1);
    assert_eq!(added[0]["data"]["content_length"], 3);
    assert_eq!(added[0]["data"]["memory_count_after"], 1);
    assert_eq!(journal.events("memory_initialized").len(), 1);
}

#[tokio::test]
async fn observe_routes_reviews_to_add() {
    let mem = memory(MemoryKind::Dilu, Arc::new(ScriptedModel::empty()), Journal::in_memory()).await;

    assert_eq!(mem.observe("review: Great tacos, slow service.").await.unwrap(), None);
    assert_eq!(mem.count().await.unwrap(), 1);

    let retrieved = mem.observe("tacos").await.unwrap();
    assert_eq!(retrieved.as_deref(), Some(" Great tacos, slow service."));
}

// ═══════════════════════════════════════════════════════════════════════
//  Retrieval policies
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn dilu_returns_stored_text_verbatim() {
    let journal = Journal::in_memory();
    let mem = memory(MemoryKind::Dilu, Arc::new(ScriptedModel::empty()), journal.clone()).await;

    let stored = [
        "The sushi was fresh and the chef friendly.",
        "Roaches everywhere in the motel room.",
    ];
    for text in stored {
        mem.add(text).await.unwrap();
    }

    let result = mem.retrieve("motel room with roaches").await.unwrap();
    assert_eq!(result, stored[1]);

    let retrieved = journal.events("memory_retrieved");
    assert_eq!(retrieved[0]["data"]["memory_count"], 2);
    assert!(retrieved[0]["data"]["similarity_score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn task_plan_composes_banner_and_plan_from_stored_trajectory() {
    let llm = Arc::new(ScriptedModel::new(["1. Check cleanliness first."]));
    let mem = memory(MemoryKind::TaskPlan, llm.clone(), Journal::in_memory()).await;

    mem.add("Reviewed a motel: dirty sheets, rude staff.").await.unwrap();
    let result = mem.retrieve("write a motel review").await.unwrap();

    assert_eq!(result, format!("{PLAN_BANNER}1. Check cleanliness first."));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0].messages[0].content;
    assert!(prompt.contains("Success Case:\nReviewed a motel: dirty sheets, rude staff.\n"));
    assert!(prompt.contains("Ongoing task:\nwrite a motel review\n"));
    assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
}

#[tokio::test]
async fn voyager_matches_summary_but_returns_trajectory() {
    let llm = Arc::new(ScriptedModel::new(["A guest complained about bugs in a cheap motel."]));
    let journal = Journal::in_memory();
    let mem = memory(MemoryKind::Voyager, llm.clone(), journal.clone()).await;

    let trajectory = "stars: 1.0 review: Saw three roaches on the first night.";
    mem.add(trajectory).await.unwrap();
    assert_eq!(llm.call_count(), 1);

    let result = mem.retrieve("cheap motel bugs").await.unwrap();
    assert_eq!(result, trajectory);
    assert_eq!(llm.call_count(), 1, "retrieval must not call the model");

    let added = &journal.events("memory_added")[0]["data"];
    assert_eq!(
        added["summary_length"],
        "A guest complained about bugs in a cheap motel.".len()
    );
}

#[tokio::test]
async fn voyager_summary_failure_propagates() {
    let mem = memory(MemoryKind::Voyager, Arc::new(ScriptedModel::empty()), Journal::in_memory()).await;
    assert!(mem.add("anything").await.is_err());
    assert_eq!(mem.count().await.unwrap(), 0);
}

#[tokio::test]
async fn generative_picks_highest_scored_candidate() {
    let llm = Arc::new(ScriptedModel::with_responder(|req| {
        let prompt = &req.messages[0].content;
        let score = if prompt.contains("Success Case:\nbeta") {
            "Score: 9"
        } else if prompt.contains("Success Case:\nalpha") {
            "4"
        } else {
            "not sure"
        };
        Ok(Completion::One(score.to_owned()))
    }));
    let journal = Journal::in_memory();
    let mem = memory(MemoryKind::Generative, llm.clone(), journal.clone()).await;

    for text in ["alpha review text", "beta review text", "gamma review text"] {
        mem.add(text).await.unwrap();
    }
    let result = mem.retrieve("review text").await.unwrap();
    assert_eq!(result, "beta review text");

    let requests = llm.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.stop == vec!["\n".to_owned()]));

    let scored = journal.events("importance_scored");
    assert_eq!(scored.len(), 3);
    let selected = &journal.events("memory_selected")[0]["data"];
    assert_eq!(selected["max_score"], 9);
    let mut all: Vec<u64> = selected["all_scores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, vec![0, 4, 9]);
}

#[tokio::test]
async fn generative_model_failure_propagates() {
    let llm = Arc::new(ScriptedModel::from_results([Err(LlmError::provider("blocked"))]));
    let mem = memory(MemoryKind::Generative, llm, Journal::in_memory()).await;
    mem.add("something").await.unwrap();
    assert!(mem.retrieve("something").await.is_err());
}

// ═══════════════════════════════════════════════════════════════════════
//  On-disk stores
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn on_disk_stores_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let config = MemoryStoreConfig::on_disk(dir.path());
    let llm: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::empty());
    let embedder = Arc::new(HashEmbedder::default());

    let first = EpisodicMemory::open(
        MemoryKind::Dilu,
        &config,
        llm.clone(),
        embedder.clone(),
        Journal::disabled(),
    )
    .await
    .unwrap();
    first.add("only in the first store").await.unwrap();

    let second = EpisodicMemory::open(MemoryKind::Dilu, &config, llm, embedder, Journal::disabled())
        .await
        .unwrap();
    assert_eq!(second.count().await.unwrap(), 0);
    assert_eq!(first.count().await.unwrap(), 1);

    let files = std::fs::read_dir(dir.path().join("dilu")).unwrap().count();
    assert!(files >= 2);
}
