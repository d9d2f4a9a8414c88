//! Journaling wrapper around any [`LanguageModel`].

use std::time::Instant;

use async_trait::async_trait;

use crate::error::Result;
use crate::journal::{CallInput, CallOutput, Journal};
use crate::model::LanguageModel;
use crate::types::{ChatRequest, Completion};

/// Delegates to an inner model and writes exactly one `llm_call` journal
/// entry per call, before the result (or error) is handed back.
#[derive(Debug, Clone)]
pub struct ObservedModel<M> {
    inner: M,
    journal: Journal,
}

impl<M: LanguageModel> ObservedModel<M> {
    pub fn new(inner: M, journal: Journal) -> Self {
        Self { inner, journal }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for ObservedModel<M> {
    async fn call(&self, request: &ChatRequest) -> Result<Completion> {
        let started = Instant::now();
        let result = self.inner.call(request).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.inner.model_name().to_owned());

        let output = match &result {
            Ok(completion) => {
                tracing::debug!(
                    module = request.site.module,
                    function = request.site.function,
                    duration_ms,
                    response_chars = completion.text_len(),
                    "llm call completed"
                );
                CallOutput {
                    response: Some(completion.clone()),
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!(
                    module = request.site.module,
                    function = request.site.function,
                    duration_ms,
                    error = %e,
                    "llm call failed"
                );
                CallOutput {
                    response: None,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        };

        let input = CallInput {
            messages: request.messages.clone(),
            model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop_strs: (!request.stop.is_empty()).then(|| request.stop.clone()),
            n: request.n,
        };
        self.journal.log_llm_call(request.site, input, output);

        result
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
