//! Provider trait and the OpenAI-compatible upstream implementation

pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Stream of incremental events from a provider
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Trait implemented by the upstream completion backend
///
/// Requests handed to a provider have already been rewritten for text-only
/// models and never carry tool definitions.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Send a non-streaming completion request
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Send a streaming completion request
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, LlmError>;
}
