//! Bounded concurrent execution of many tasks.
//!
//! Each task gets its own agent (and so its own memory store) from the
//! [`AgentFactory`]; workers share nothing but the model, the dataset and
//! the journal. Results come back in task order.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::parser::Decision;
use crate::task::Task;
use crate::workflow::AgentFactory;

/// Pool size used when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on tasks in flight. Zero is treated as one.
    pub max_workers: usize,
}

impl RunnerConfig {
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers }
    }

    /// `enable_threading = false` runs tasks one at a time.
    pub fn from_threading(enable_threading: bool, max_workers: usize) -> Self {
        Self {
            max_workers: if enable_threading { max_workers } else { 1 },
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// The result of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub index: usize,
    pub task: Task,
    pub decision: Decision,
    pub duration_ms: f64,
}

/// Run every task with at most `config.max_workers` in flight.
///
/// The returned outcomes are ordered like `tasks`. A worker that panics is
/// reported with [`Decision::failed`].
pub async fn run_tasks(
    tasks: Vec<Task>,
    factory: Arc<AgentFactory>,
    config: RunnerConfig,
) -> Vec<TaskOutcome> {
    let workers = config.max_workers.max(1);
    let total = tasks.len();
    info!(tasks = total, workers, "starting simulation run");

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    for (index, task) in tasks.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let factory = Arc::clone(&factory);
        set.spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await.ok();
            let worker = tokio::spawn(run_one(index, task.clone(), Arc::clone(&factory)));
            match worker.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(index, error = %e, "worker aborted");
                    factory.journal.simulation_event(
                        "task_complete",
                        Some(&index.to_string()),
                        json!({ "index": index, "failed": true, "error": e.to_string() }),
                    );
                    TaskOutcome {
                        index,
                        task,
                        decision: Decision::failed(),
                        duration_ms: 0.0,
                    }
                }
            }
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!(error = %e, "task supervisor aborted"),
        }
    }
    outcomes.sort_by_key(|o| o.index);

    let failed = outcomes.iter().filter(|o| o.decision.is_failure()).count();
    info!(tasks = total, failed, "simulation run finished");
    outcomes
}

async fn run_one(index: usize, task: Task, factory: Arc<AgentFactory>) -> TaskOutcome {
    let task_id = index.to_string();
    factory.journal.simulation_event(
        "task_start",
        Some(&task_id),
        json!({ "index": index, "user_id": task.user_id, "item_id": task.item_id }),
    );

    let started = Instant::now();
    let decision = factory.run_task(&task, Some(&task_id)).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    factory.journal.simulation_event(
        "task_complete",
        Some(&task_id),
        json!({
            "index": index,
            "duration_ms": duration_ms,
            "stars": decision.stars,
            "failed": decision.is_failure(),
        }),
    );
    TaskOutcome {
        index,
        task,
        decision,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threading_off_means_one_worker() {
        assert_eq!(RunnerConfig::from_threading(false, 8).max_workers, 1);
        assert_eq!(RunnerConfig::from_threading(true, 8).max_workers, 8);
        assert_eq!(RunnerConfig::default().max_workers, 10);
    }
}
