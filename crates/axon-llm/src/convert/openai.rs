//! Conversion between internal types and `OpenAI` wire format

use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall,
    OpenAiImageUrl, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChoice, OpenAiStreamChunk,
    OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamOptions, OpenAiStreamToolCall, OpenAiTool, OpenAiToolCall,
    OpenAiUsage,
};
use crate::types::{
    Choice, ChoiceMessage, ChunkChoice, CompletionChunk, CompletionParams, CompletionRequest, CompletionResponse,
    Content, ContentPart, FinishReason, FunctionCall, FunctionDefinition, Message, ResponseMeta, Role, StreamDelta,
    StreamEvent, ToolCall, ToolDefinition, Usage,
};

// -- Inbound: OpenAI wire format -> internal types --

impl From<OpenAiRequest> for CompletionRequest {
    fn from(req: OpenAiRequest) -> Self {
        Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            params: CompletionParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_tokens,
                stop: req.stop,
                seed: req.seed,
            },
            tools: req.tools.map(|tools| tools.into_iter().map(Into::into).collect()),
            stream: req.stream.unwrap_or(false),
        }
    }
}

impl From<OpenAiMessage> for Message {
    fn from(msg: OpenAiMessage) -> Self {
        let role = match msg.role.as_str() {
            "system" | "developer" => Role::System,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        };

        let content = match msg.content {
            Some(OpenAiContent::Text(text)) => Content::Text(text),
            Some(OpenAiContent::Parts(parts)) => Content::Parts(parts.into_iter().map(Into::into).collect()),
            None => Content::Text(String::new()),
        };

        Self {
            role,
            content,
            name: msg.name,
            tool_calls: msg
                .tool_calls
                .map(|calls| calls.into_iter().map(Into::into).collect()),
            tool_call_id: msg.tool_call_id,
        }
    }
}

impl From<OpenAiToolCall> for ToolCall {
    fn from(tc: OpenAiToolCall) -> Self {
        Self {
            id: tc.id,
            function: FunctionCall {
                name: tc.function.name,
                arguments: tc.function.arguments,
            },
        }
    }
}

impl From<OpenAiContentPart> for ContentPart {
    fn from(part: OpenAiContentPart) -> Self {
        match part {
            OpenAiContentPart::Text { text } => Self::Text { text },
            OpenAiContentPart::ImageUrl { image_url } => Self::Image {
                url: image_url.url,
                detail: image_url.detail,
            },
        }
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            tool_type: tool.tool_type,
            function: FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            total_cost: usage.total_cost,
        }
    }
}

/// Parse an `OpenAI` response into internal types
impl From<OpenAiResponse> for CompletionResponse {
    fn from(resp: OpenAiResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| Choice {
                    index: c.index,
                    finish_reason: c.finish_reason.as_deref().and_then(FinishReason::parse),
                    message: ChoiceMessage {
                        role: c.message.role,
                        content: c.message.content,
                        tool_calls: c
                            .message
                            .tool_calls
                            .map(|calls| calls.into_iter().map(Into::into).collect()),
                    },
                })
                .collect(),
            usage: resp.usage.map(Into::into),
        }
    }
}

// -- Outbound: internal types -> OpenAI wire format --

impl From<CompletionResponse> for OpenAiResponse {
    fn from(resp: CompletionResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp.choices.into_iter().map(Into::into).collect(),
            usage: resp.usage.map(Into::into),
        }
    }
}

impl From<Choice> for OpenAiChoice {
    fn from(choice: Choice) -> Self {
        Self {
            index: choice.index,
            message: OpenAiChoiceMessage {
                role: choice.message.role,
                content: choice.message.content,
                tool_calls: choice
                    .message
                    .tool_calls
                    .map(|calls| calls.iter().map(Into::into).collect()),
            },
            finish_reason: choice.finish_reason.map(|fr| fr.as_str().to_owned()),
        }
    }
}

impl From<&ToolCall> for OpenAiToolCall {
    fn from(tc: &ToolCall) -> Self {
        Self {
            id: tc.id.clone(),
            tool_type: "function".to_owned(),
            function: OpenAiFunctionCall {
                name: tc.function.name.clone(),
                arguments: tc.function.arguments.clone(),
            },
        }
    }
}

impl From<Usage> for OpenAiUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            total_cost: usage.total_cost,
        }
    }
}

impl From<CompletionChunk> for OpenAiStreamChunk {
    fn from(chunk: CompletionChunk) -> Self {
        Self {
            id: chunk.meta.id,
            object: "chat.completion.chunk".to_owned(),
            created: chunk.meta.created,
            model: chunk.meta.model,
            choices: chunk.choices.into_iter().map(Into::into).collect(),
            usage: chunk.usage.map(Into::into),
        }
    }
}

impl From<ChunkChoice> for OpenAiStreamChoice {
    fn from(choice: ChunkChoice) -> Self {
        let tool_calls = choice.delta.tool_calls.map(|calls| {
            calls
                .into_iter()
                .zip(0u32..)
                .map(|(tc, index)| OpenAiStreamToolCall {
                    index,
                    id: Some(tc.id),
                    tool_type: Some("function".to_owned()),
                    function: Some(OpenAiStreamFunctionCall {
                        name: Some(tc.function.name),
                        arguments: Some(tc.function.arguments),
                    }),
                })
                .collect()
        });

        Self {
            index: choice.index,
            delta: OpenAiStreamDelta {
                role: Some(choice.delta.role),
                content: choice.delta.content,
                tool_calls,
            },
            finish_reason: choice.finish_reason.map(|fr| fr.as_str().to_owned()),
        }
    }
}

// -- Outbound: internal request -> OpenAI wire request (for sending to provider) --

impl From<&CompletionRequest> for OpenAiRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_tokens: req.params.max_tokens,
            stop: req.params.stop.clone(),
            seed: req.params.seed,
            stream: req.stream.then_some(true),
            tools: req.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: t.tool_type.clone(),
                        function: OpenAiFunction {
                            name: t.function.name.clone(),
                            description: t.function.description.clone(),
                            parameters: t.function.parameters.clone(),
                        },
                    })
                    .collect()
            }),
            tool_choice: None,
            stream_options: req.stream.then_some(OpenAiStreamOptions { include_usage: true }),
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let content = match &msg.content {
            Content::Text(text) => OpenAiContent::Text(text.clone()),
            Content::Parts(parts) => OpenAiContent::Parts(parts.iter().map(Into::into).collect()),
        };

        Self {
            role: role.to_owned(),
            content: Some(content),
            name: msg.name.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| calls.iter().map(Into::into).collect()),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { url, detail } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: url.clone(),
                    detail: detail.clone(),
                },
            },
        }
    }
}

// -- Stream conversion --

/// Convert an `OpenAI` stream chunk into internal stream events
pub fn openai_chunk_to_events(chunk: OpenAiStreamChunk) -> Vec<StreamEvent> {
    let meta = ResponseMeta {
        id: chunk.id,
        created: chunk.created,
        model: chunk.model,
    };

    let mut events: Vec<StreamEvent> = chunk
        .choices
        .into_iter()
        .map(|choice| {
            StreamEvent::Delta(StreamDelta {
                meta: meta.clone(),
                index: choice.index,
                content: choice.delta.content,
                finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::parse),
            })
        })
        .collect();

    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage.into()));
    }

    events
}
