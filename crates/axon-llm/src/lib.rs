//! Tool-calling adapter for text-only LLM providers
//!
//! Accepts OpenAI-style chat completion requests carrying tool definitions,
//! describes the tools to the upstream model through an injected system
//! prompt, and turns the model's free-form reply back into either a plain
//! message or a typed tool call.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod error;
pub mod extract;
pub mod format;
#[cfg(feature = "http")]
pub mod handler;
pub mod prompt;
pub mod protocol;
pub mod provider;
pub mod reducer;
pub mod resolve;
pub mod state;
pub mod types;
pub mod xml;

pub use error::{AdapterError, HttpError, LlmError, ResolveError};
#[cfg(feature = "http")]
pub use handler::llm_router;
pub use provider::Provider;
pub use reducer::StreamReducer;
pub use state::LlmState;
pub use types::{Action, CompletionRequest, CompletionResponse, StreamEvent};
