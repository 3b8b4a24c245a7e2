//! Mapping resolved actions onto outbound envelopes

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::types::{
    Action, Choice, ChoiceMessage, ChunkChoice, CompletionChunk, CompletionResponse, FinishReason, ResponseMeta,
    ToolCall, Usage, response::build_tool_call,
};

/// A resolved action together with the provider metadata it came with
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The terminal action
    pub action: Action,
    /// Provider response metadata
    pub meta: ResponseMeta,
    /// Usage reported by the provider, passed through verbatim
    pub usage: Option<Usage>,
    /// Last finish reason the provider reported
    pub finish_reason: Option<FinishReason>,
}

impl Resolution {
    /// Message-shaped envelope for non-streaming responses
    pub fn into_response(self) -> CompletionResponse {
        let meta = fill_meta(self.meta);
        let finish_reason = finish_reason(&self.action, self.finish_reason);

        CompletionResponse {
            id: meta.id,
            object: "chat.completion".to_owned(),
            created: meta.created,
            model: meta.model,
            choices: vec![Choice {
                index: 0,
                message: message(self.action),
                finish_reason: Some(finish_reason),
            }],
            usage: self.usage,
        }
    }

    /// Delta-shaped envelopes for streaming responses
    ///
    /// The first chunk carries the whole action. A second, choice-less chunk
    /// follows when the provider reported usage.
    pub fn into_chunks(self) -> Vec<CompletionChunk> {
        let meta = fill_meta(self.meta);
        let finish_reason = finish_reason(&self.action, self.finish_reason);

        let mut chunks = vec![CompletionChunk {
            meta: meta.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: message(self.action),
                finish_reason: Some(finish_reason),
            }],
            usage: None,
        }];

        if let Some(usage) = self.usage {
            chunks.push(CompletionChunk {
                meta,
                choices: vec![],
                usage: Some(usage),
            });
        }

        chunks
    }
}

fn message(action: Action) -> ChoiceMessage {
    match action {
        Action::TextMessage { content } => ChoiceMessage::text(content),
        Action::ToolCall { name, arguments } => ChoiceMessage::with_tool_calls(vec![tool_call(name, &arguments)]),
    }
}

/// Build the wire tool call, minting a fresh id every time
fn tool_call(name: String, arguments: &serde_json::Map<String, serde_json::Value>) -> ToolCall {
    let arguments = serde_json::Value::Object(arguments.clone()).to_string();
    build_tool_call(format!("call_{}", Uuid::new_v4().simple()), name, arguments)
}

/// Tool calls report `tool_calls` unless generation was cut short
fn finish_reason(action: &Action, reported: Option<FinishReason>) -> FinishReason {
    match (action, reported) {
        (_, Some(reason @ (FinishReason::Length | FinishReason::ContentFilter))) => reason,
        (Action::ToolCall { .. }, _) => FinishReason::ToolCalls,
        (Action::TextMessage { .. }, _) => FinishReason::Stop,
    }
}

/// Fill in an id and timestamp when the provider omitted them
fn fill_meta(mut meta: ResponseMeta) -> ResponseMeta {
    if meta.id.is_empty() {
        meta.id = format!("chatcmpl-{}", Uuid::new_v4().simple());
    }
    if meta.created == 0 {
        meta.created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
    }
    meta
}
