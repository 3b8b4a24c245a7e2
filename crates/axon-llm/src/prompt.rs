//! Prompt assembly for text-only upstream models
//!
//! Tool definitions are rendered into the instruction template and injected
//! as a system message. Tool results are rewritten into a role the upstream
//! accepts, wrapped so the model can tell them apart from user text.

use std::path::Path;

use axon_config::ToolResultRole;

use crate::error::AdapterError;
use crate::types::{Content, Message, Role, ToolDefinition};
use crate::xml;

/// Placeholder replaced by the rendered tool set
pub const TOOLS_PLACEHOLDER: &str = "{{tools}}";

/// Rendered in place of the tool set when the request carries none
pub const NO_TOOLS_SENTINEL: &str = "No tools available. Do not call any!";

/// Read the instruction template from disk
pub async fn load_template(path: &Path) -> Result<String, AdapterError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AdapterError::TemplateLoad {
            path: path.to_path_buf(),
            source,
        })
}

/// Render the tool set for the template placeholder
pub fn render_tools(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        NO_TOOLS_SENTINEL.to_owned()
    } else {
        xml::render_tools(tools)
    }
}

/// Build the outbound message list
///
/// Returns a new list; the caller's messages are never modified. The
/// instruction message is appended, or placed right before the last
/// message when that message is a tool result.
pub fn assemble(
    messages: &[Message],
    tools: &[ToolDefinition],
    template: &str,
    tool_result_role: ToolResultRole,
) -> Vec<Message> {
    let instructions = Message::text(Role::System, template.replace(TOOLS_PLACEHOLDER, &render_tools(tools)));

    let mut out: Vec<Message> = messages
        .iter()
        .map(|message| match message.role {
            Role::Tool => rewrite_tool_result(message, tool_result_role),
            _ => message.clone(),
        })
        .collect();

    let insert_at = match messages.last() {
        Some(last) if last.role == Role::Tool => out.len() - 1,
        _ => out.len(),
    };
    out.insert(insert_at, instructions);

    out
}

/// Wrap a tool result so it reads as synthetic framing rather than user text
fn rewrite_tool_result(message: &Message, role: ToolResultRole) -> Message {
    let source = message
        .name
        .as_deref()
        .or(message.tool_call_id.as_deref())
        .unwrap_or("unknown");

    let content = format!(
        "*SYSTEM MESSAGE*\nResponse from the tool you just called.\n<tool_response source=\"{source}\">\n{}\n</tool_response>",
        message.content.as_text()
    );

    let role = match role {
        ToolResultRole::User => Role::User,
        ToolResultRole::System => Role::System,
    };

    Message {
        role,
        content: Content::Text(content),
        name: None,
        tool_calls: None,
        tool_call_id: None,
    }
}
