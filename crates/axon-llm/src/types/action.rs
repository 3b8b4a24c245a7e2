use serde_json::{Map, Value};

/// The resolved intent of a model response
///
/// Exactly one action is produced per request or per stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Plain assistant text
    TextMessage {
        /// Text shown to the user
        content: String,
    },
    /// Invocation of a caller-supplied tool
    ToolCall {
        /// Tool name
        name: String,
        /// Decoded arguments
        arguments: Map<String, Value>,
    },
}

impl Action {
    /// Build a text message action
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextMessage {
            content: content.into(),
        }
    }

    /// Whether this action invokes a tool
    pub const fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}
