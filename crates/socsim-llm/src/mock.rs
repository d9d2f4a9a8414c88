//! Deterministic model for tests. No network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LlmError, Result};
use crate::model::LanguageModel;
use crate::types::{ChatRequest, Completion};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<Completion> + Send + Sync>;

enum Script {
    Queue(VecDeque<Result<Completion>>),
    Closure(Responder),
}

/// A [`LanguageModel`] that replays a fixed script.
///
/// Every request is recorded so tests can assert on prompts and sampling
/// parameters. Once a queued script runs dry, calls fail with a provider
/// error.
pub struct ScriptedModel {
    script: Mutex<Script>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl ScriptedModel {
    /// Queue single-text answers, one per call.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(
            responses
                .into_iter()
                .map(|r| Ok(Completion::One(r.into()))),
        )
    }

    /// Queue arbitrary results, including errors and multi-completions.
    pub fn from_results(results: impl IntoIterator<Item = Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(results.into_iter().collect())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model with nothing queued; every call fails.
    pub fn empty() -> Self {
        Self::from_results(std::iter::empty())
    }

    /// Answer every call with a closure.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<Completion> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(Script::Closure(Box::new(responder))),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append another answer to a queued script.
    pub fn push(&self, result: Result<Completion>) {
        if let Ok(mut script) = self.script.lock()
            && let Script::Queue(queue) = &mut *script
        {
            queue.push_back(result);
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn call(&self, request: &ChatRequest) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut script = self
            .script
            .lock()
            .map_err(|_| LlmError::provider("scripted model lock poisoned"))?;
        match &mut *script {
            Script::Queue(queue) => queue
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::provider("script exhausted"))),
            Script::Closure(responder) => responder(request),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let model = ScriptedModel::new(["one", "two"]);
        assert_eq!(model.call(&ChatRequest::user("a")).await.unwrap().into_text(), "one");
        assert_eq!(model.call(&ChatRequest::user("b")).await.unwrap().into_text(), "two");
        assert!(model.call(&ChatRequest::user("c")).await.is_err());

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].messages[0].content, "b");
    }

    #[tokio::test]
    async fn responder_sees_request() {
        let model = ScriptedModel::with_responder(|req| {
            Ok(Completion::Many(vec![format!("n={}", req.n); req.n as usize]))
        });
        let out = model.call(&ChatRequest::user("x").n(3)).await.unwrap();
        assert_eq!(out.into_candidates().len(), 3);
    }
}
