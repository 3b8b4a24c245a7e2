//! Turning extracted payloads into typed actions
//!
//! Lookups that have fallbacks are written as ordered lists of JSON
//! pointers tried in turn; the first hit wins and misses leave no trace
//! beyond the list of paths reported when every one of them failed.

use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::extract::{self, ExtractedPayload, SyntaxKind};
use crate::types::Action;
use crate::xml;

/// Where the action payload may live, in lookup order
const ACTION_DATA_PATHS: [&str; 3] = ["/action_data", "/action/action_data", "/alt_action_data"];

/// Where a text message may live, in lookup order
const MESSAGE_PATHS: [&str; 3] = [
    "/action_data/message",
    "/action/action_data/message",
    "/alt_action_data/message",
];

/// Where a tool name and its arguments may live, in lookup order
const TOOL_PATHS: [(&str, &str); 4] = [
    ("/action_data/name", "/action_data/arguments"),
    ("/action/action_data/name", "/action/action_data/arguments"),
    ("/alt_action_data/name", "/alt_action_data/arguments"),
    ("/action/name", "/action/arguments"),
];

/// Resolve a complete model output into an action
///
/// Candidates are tried in detector order. One that cannot be decoded, or
/// decodes to something other than an action object, hands over to the next
/// detector. A candidate that decodes but is semantically invalid fails the
/// whole resolution.
///
/// When nothing resolves, the output is plain text unless it was an attempt
/// at structure: a candidate that failed to decode where structure was
/// clearly intended, a `<tool_call>` marker, or structured-looking text that
/// yielded no decodable candidate at all. Well-formed JSON without an
/// `action` key is ordinary content.
pub fn resolve(raw: &str) -> Result<Action, ResolveError> {
    let mut failed: Option<String> = None;
    let mut decoded_any = false;

    for candidate in extract::candidates(raw) {
        match resolve_candidate(&candidate) {
            Ok(Outcome::Resolved(action)) => {
                tracing::debug!(kind = candidate.kind.as_str(), "resolved model output");
                return Ok(action);
            }
            Ok(Outcome::NotAnAction) => decoded_any = true,
            Ok(Outcome::Undecodable) => {
                if failed.is_none() && is_deliberate(&candidate, raw) {
                    failed = Some(candidate.payload);
                }
            }
            Err(error) => {
                tracing::warn!(
                    kind = candidate.kind.as_str(),
                    raw = %raw,
                    candidate = %candidate.payload,
                    error = %error,
                    "failed to resolve model output"
                );
                return Err(error);
            }
        }
    }

    let malformed = failed.is_some()
        || raw.contains(extract::TOOL_CALL_OPEN)
        || (!decoded_any && extract::looks_structured(raw));

    if malformed {
        tracing::warn!(raw = %raw, candidate = ?failed, "malformed model response");
        return Err(ResolveError::MalformedResponse {
            raw: raw.to_owned(),
            candidate: failed,
        });
    }

    Ok(Action::text(extract::plain_text(raw)))
}

/// What a single candidate turned out to be
enum Outcome {
    Resolved(Action),
    /// Decoded cleanly but carries no `action` key
    NotAnAction,
    Undecodable,
}

/// Whether an undecodable candidate was meant as structure
///
/// A bare object only counts when the whole output opens with it; a stray
/// brace inside prose does not.
fn is_deliberate(candidate: &ExtractedPayload, raw: &str) -> bool {
    match candidate.kind {
        SyntaxKind::JsonBare => extract::opens_with_object(raw),
        SyntaxKind::XmlToolCall | SyntaxKind::JsonFenced | SyntaxKind::CallExpression => true,
        SyntaxKind::None => false,
    }
}

fn resolve_candidate(candidate: &ExtractedPayload) -> Result<Outcome, ResolveError> {
    match candidate.kind {
        SyntaxKind::XmlToolCall => match xml::decode(&candidate.payload) {
            Ok(tree) => resolve_xml_tree(&tree).map(Outcome::Resolved),
            Err(error) => {
                tracing::debug!(error = %error, "tool call block is not valid XML");
                Ok(Outcome::Undecodable)
            }
        },
        SyntaxKind::JsonFenced | SyntaxKind::JsonBare | SyntaxKind::CallExpression => {
            match serde_json::from_str::<Value>(&candidate.payload) {
                Ok(value) if value.get("action").is_some() => resolve_json(&value).map(Outcome::Resolved),
                Ok(_) => Ok(Outcome::NotAnAction),
                Err(error) => {
                    tracing::debug!(kind = candidate.kind.as_str(), error = %error, "candidate is not valid JSON");
                    Ok(Outcome::Undecodable)
                }
            }
        }
        SyntaxKind::None => Ok(Outcome::Resolved(Action::text(extract::plain_text(&candidate.payload)))),
    }
}

/// Resolve a `<tool_call>` block
///
/// # Errors
///
/// Returns `ResolveError::InvalidXml` when the block does not parse and
/// `ResolveError::MissingToolData` when it lacks a tool name.
pub fn resolve_xml(payload: &str) -> Result<Action, ResolveError> {
    resolve_xml_tree(&xml::decode(payload)?)
}

fn resolve_xml_tree(tree: &Value) -> Result<Action, ResolveError> {
    let missing = |path: &str| ResolveError::MissingToolData {
        tried: vec![path.to_owned()],
    };

    let name = match tree.pointer("/tool_call/tool_name") {
        Some(Value::String(name)) => Some(name.as_str()),
        Some(Value::Object(node)) => node.get("#text").and_then(Value::as_str),
        _ => None,
    }
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .ok_or_else(|| missing("/tool_call/tool_name"))?;

    let arguments = match tree.pointer("/tool_call/parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params
            .iter()
            .filter(|(key, _)| key.as_str() != "@type")
            .map(|(key, value)| (key.clone(), parameter_value(value)))
            .collect(),
        Some(_) => return Err(missing("/tool_call/parameters")),
    };

    Ok(Action::ToolCall {
        name: name.to_owned(),
        arguments,
    })
}

/// A parameter node's text when it has any, else its structure
///
/// Applied at every depth; `@type` attributes are never kept.
fn parameter_value(value: &Value) -> Value {
    match value {
        Value::Object(node) => match node.get("#text") {
            Some(text) => text.clone(),
            None => Value::Object(
                node.iter()
                    .filter(|(key, _)| key.as_str() != "@type")
                    .map(|(key, item)| (key.clone(), parameter_value(item)))
                    .collect(),
            ),
        },
        Value::Array(items) => Value::Array(items.iter().map(parameter_value).collect()),
        other => other.clone(),
    }
}

/// Which of the two actions a JSON payload asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    TextMessage,
    ToolCall,
}

impl ActionKind {
    /// `action` is either a string or an object with a `type` field
    fn decode(value: &Value) -> Result<Self, ResolveError> {
        let field = value.get("action").unwrap_or(&Value::Null);
        let name = match field {
            Value::String(name) => Some(name.as_str()),
            Value::Object(action) => action.get("type").and_then(Value::as_str),
            _ => None,
        };

        let invalid = || ResolveError::InvalidAction {
            action: name.map_or_else(|| field.to_string(), str::to_owned),
        };

        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("text_message") => Ok(Self::TextMessage),
            Some("tool_call") => Ok(Self::ToolCall),
            _ => Err(invalid()),
        }
    }
}

/// Resolve a decoded JSON action object
///
/// # Errors
///
/// Returns `ResolveError::InvalidAction` for an unknown action and one of the
/// `Missing*` variants when every fallback path for a required field misses.
pub fn resolve_json(value: &Value) -> Result<Action, ResolveError> {
    let kind = ActionKind::decode(value)?;

    if !ACTION_DATA_PATHS.iter().any(|path| value.pointer(path).is_some()) {
        return Err(ResolveError::MissingActionData {
            tried: paths(&ACTION_DATA_PATHS),
        });
    }

    match kind {
        ActionKind::TextMessage => MESSAGE_PATHS
            .iter()
            .find_map(|path| message_at(value, path))
            .map(|message| Action::text(extract::strip_framing_tags(&message)))
            .ok_or_else(|| ResolveError::MissingMessage {
                tried: paths(&MESSAGE_PATHS),
            }),
        ActionKind::ToolCall => TOOL_PATHS
            .iter()
            .find_map(|(name, arguments)| tool_at(value, name, arguments))
            .ok_or_else(|| ResolveError::MissingToolData {
                tried: TOOL_PATHS
                    .iter()
                    .map(|(name, arguments)| format!("{name} + {arguments}"))
                    .collect(),
            }),
    }
}

fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| (*p).to_owned()).collect()
}

fn message_at(value: &Value, path: &str) -> Option<String> {
    match value.pointer(path)? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn tool_at(value: &Value, name_path: &str, arguments_path: &str) -> Option<Action> {
    let name = value
        .pointer(name_path)?
        .as_str()
        .map(str::trim)
        .filter(|name| !name.is_empty())?;

    let arguments = match value.pointer(arguments_path)? {
        Value::Object(arguments) => arguments.clone(),
        Value::String(encoded) => match serde_json::from_str(encoded).ok()? {
            Value::Object(arguments) => arguments,
            _ => return None,
        },
        _ => return None,
    };

    Some(Action::ToolCall {
        name: name.to_owned(),
        arguments,
    })
}
