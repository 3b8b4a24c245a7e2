//! Internal canonical types for LLM request/response representation
//!
//! These types are provider-agnostic and serve as the normalized internal
//! representation that wire formats convert to and from.

pub mod action;
pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use action::Action;
pub use message::{Content, ContentPart, FunctionCall, Message, Role, ToolCall};
pub use request::{CompletionParams, CompletionRequest};
pub use response::{
    Choice, ChoiceMessage, ChunkChoice, CompletionChunk, CompletionResponse, FinishReason, ResponseMeta, Usage,
};
pub use stream::{StreamDelta, StreamEvent};
pub use tool::{FunctionDefinition, ToolDefinition};
