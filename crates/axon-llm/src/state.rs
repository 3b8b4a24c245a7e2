//! Request pipeline: prompt assembly, provider call, resolution, formatting

use std::path::PathBuf;
use std::sync::Arc;

use axon_config::{LlmConfig, PromptConfig, ToolResultRole};
use futures_util::StreamExt;

use crate::error::{AdapterError, LlmError};
use crate::format::Resolution;
use crate::prompt;
use crate::provider::openai::OpenAiProvider;
use crate::provider::{EventStream, Provider};
use crate::reducer::StreamReducer;
use crate::resolve;
use crate::types::{CompletionChunk, CompletionRequest, CompletionResponse};

/// Shared state for the completion route handlers
#[derive(Clone)]
pub struct LlmState {
    pub(crate) inner: Arc<LlmStateInner>,
}

pub(crate) struct LlmStateInner {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) template_path: PathBuf,
    pub(crate) tool_result_role: ToolResultRole,
}

/// An upstream stream that has been opened but not yet reduced
pub struct PendingStream {
    events: EventStream,
}

impl PendingStream {
    /// Drain the provider stream and produce the outbound chunks
    ///
    /// A transport failure inside a `<tool_call>` block is reported as a
    /// malformed response, like a stream that ends there.
    pub async fn finish(mut self) -> Result<Vec<CompletionChunk>, AdapterError> {
        let mut reducer = StreamReducer::new();

        while let Some(event) = self.events.next().await {
            match event {
                Ok(event) => reducer.push(event)?,
                Err(error) => {
                    if let Some(malformed) = reducer.interrupted() {
                        tracing::warn!(error = %error, "provider stream failed inside a tool call block");
                        return Err(malformed.into());
                    }
                    return Err(error.into());
                }
            }
        }

        Ok(reducer.finish()?.into_chunks())
    }
}

impl LlmState {
    /// Build the state around the configured OpenAI-compatible upstream
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client cannot be created
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = OpenAiProvider::new(&config.provider)?;
        Ok(Self::new(Arc::new(provider), &config.prompt))
    }

    /// Build the state around any provider implementation
    pub fn new(provider: Arc<dyn Provider>, prompt: &PromptConfig) -> Self {
        Self {
            inner: Arc::new(LlmStateInner {
                provider,
                template_path: prompt.template_path.clone(),
                tool_result_role: prompt.tool_result_role,
            }),
        }
    }

    /// Execute a non-streaming completion
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be loaded, the provider call fails, or
    /// the model output cannot be resolved
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AdapterError> {
        let upstream = self.prepare(&request).await?;
        let response = self.inner.provider.complete(&upstream).await?;

        let action = resolve::resolve(response.first_text())?;

        Ok(Resolution {
            action,
            meta: response.meta(),
            finish_reason: response.first_finish_reason(),
            usage: response.usage,
        }
        .into_response())
    }

    /// Open a streaming completion
    ///
    /// Template and connection failures surface here; failures while the
    /// stream is consumed surface from [`PendingStream::finish`].
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be loaded or the provider rejects the call
    pub async fn complete_stream(&self, request: CompletionRequest) -> Result<PendingStream, AdapterError> {
        let upstream = self.prepare(&request).await?;
        let events = self.inner.provider.complete_stream(&upstream).await?;
        Ok(PendingStream { events })
    }

    /// Rewrite an inbound request into the one sent upstream
    async fn prepare(&self, request: &CompletionRequest) -> Result<CompletionRequest, AdapterError> {
        let template = prompt::load_template(&self.inner.template_path).await?;
        let tools = request.tools.as_deref().unwrap_or_default();

        tracing::debug!(
            provider = self.inner.provider.name(),
            model = %request.model,
            tools = tools.len(),
            stream = request.stream,
            "forwarding completion request"
        );

        Ok(CompletionRequest {
            model: request.model.clone(),
            messages: prompt::assemble(&request.messages, tools, &template, self.inner.tool_result_role),
            params: request.params.clone(),
            tools: None,
            stream: request.stream,
        })
    }
}
