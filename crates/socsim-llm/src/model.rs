//! The language-model capability.
//!
//! Everything above this crate talks to models through [`LanguageModel`],
//! shared as `Arc<dyn LanguageModel>`. Implementations: the HTTP
//! [`crate::LlmClient`], the journaling [`crate::ObservedModel`] wrapper and
//! the test double [`crate::ScriptedModel`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatRequest, Completion};

/// A model endpoint that turns a prompt into one or more completions.
///
/// Calls block the invoking task until the provider answers. Implementations
/// do not retry; a failed call is reported to the caller as-is.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion request.
    ///
    /// Returns [`Completion::One`] when `request.n == 1` and
    /// [`Completion::Many`] otherwise.
    async fn call(&self, request: &ChatRequest) -> Result<Completion>;

    /// Name of the model used when a request carries no override.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Arc<M> {
    async fn call(&self, request: &ChatRequest) -> Result<Completion> {
        (**self).call(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
