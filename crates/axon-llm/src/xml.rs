//! XML codec for tool definitions and `<tool_call>` blocks
//!
//! Decoding produces a `serde_json::Value` tree using the common
//! dict-from-XML conventions: attributes become `@name` keys, text next to
//! child elements becomes `#text`, repeated children collapse into arrays,
//! attribute-less leaves become strings and empty leaves become `null`.
//!
//! Rendering goes the other way for tool definitions: every element carries
//! a `type` attribute naming its JSON kind and list entries are `<item>`.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::types::ToolDefinition;

/// Root element wrapping rendered tool definitions
const TOOLS_ROOT: &str = "tools";

/// Element name used for list entries
const LIST_ITEM: &str = "item";

/// Element being assembled while walking the event stream
#[derive(Default)]
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>, payload: &str) -> Result<Self, ResolveError> {
        let mut frame = Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Self::default()
        };

        for attr in start.attributes() {
            let attr = attr.map_err(|e| invalid(e.to_string(), payload))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| invalid(e.to_string(), payload))?;
            frame.attributes.insert(format!("@{key}"), Value::String(value.into_owned()));
        }

        Ok(frame)
    }

    fn into_value(self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            return if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            };
        }

        let mut object = self.attributes;
        object.extend(self.children);
        if !self.text.is_empty() {
            object.insert("#text".to_owned(), Value::String(self.text));
        }
        Value::Object(object)
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }
}

fn invalid(reason: impl Into<String>, payload: &str) -> ResolveError {
    ResolveError::InvalidXml {
        reason: reason.into(),
        payload: payload.to_owned(),
    }
}

/// Decode an XML document into a `{root_name: value}` object
///
/// # Errors
///
/// Returns `ResolveError::InvalidXml` for syntax errors, mismatched or
/// unclosed elements, and documents with zero or several root elements.
pub fn decode(payload: &str) -> Result<Value, ResolveError> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref start)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(invalid("multiple root elements", payload));
                }
                stack.push(Frame::open(start, payload)?);
            }
            Ok(Event::Empty(ref start)) => {
                let frame = Frame::open(start, payload)?;
                let name = frame.name.clone();
                close(&mut stack, &mut root, name, frame.into_value(), payload)?;
            }
            Ok(Event::End(_)) => {
                let Some(frame) = stack.pop() else {
                    return Err(invalid("unexpected closing tag", payload));
                };
                let name = frame.name.clone();
                close(&mut stack, &mut root, name, frame.into_value(), payload)?;
            }
            Ok(Event::Text(ref text)) => {
                let text = text.unescape().map_err(|e| invalid(e.to_string(), payload))?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(invalid("text outside of root element", payload)),
                }
            }
            Ok(Event::CData(ref data)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(invalid(format!("XML parse error: {e}"), payload)),
            _ => {}
        }
    }

    if let Some(frame) = stack.last() {
        return Err(invalid(format!("unclosed element <{}>", frame.name), payload));
    }

    let (name, value) = root.ok_or_else(|| invalid("no root element", payload))?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

fn close(
    stack: &mut [Frame],
    root: &mut Option<(String, Value)>,
    name: String,
    value: Value,
    payload: &str,
) -> Result<(), ResolveError> {
    match stack.last_mut() {
        Some(parent) => parent.add_child(name, value),
        None if root.is_some() => return Err(invalid("multiple root elements", payload)),
        None => *root = Some((name, value)),
    }
    Ok(())
}

/// Render tool definitions as a `<tools>` document for the system prompt
pub fn render_tools(tools: &[ToolDefinition]) -> String {
    let mut out = format!("<{TOOLS_ROOT}>");
    for tool in tools {
        render_element(&mut out, LIST_ITEM, &tool_value(tool));
    }
    out.push_str(&format!("</{TOOLS_ROOT}>"));
    out
}

/// JSON view of a tool definition, omitting absent optional fields
fn tool_value(tool: &ToolDefinition) -> Value {
    let mut function = Map::new();
    function.insert("name".to_owned(), Value::String(tool.function.name.clone()));
    if let Some(description) = &tool.function.description {
        function.insert("description".to_owned(), Value::String(description.clone()));
    }
    if let Some(parameters) = &tool.function.parameters {
        function.insert("parameters".to_owned(), parameters.clone());
    }

    let mut object = Map::new();
    object.insert("type".to_owned(), Value::String(tool.tool_type.clone()));
    object.insert("function".to_owned(), Value::Object(function));
    Value::Object(object)
}

fn render_element(out: &mut String, key: &str, value: &Value) {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    };

    let (tag, name_attr) = if is_xml_name(key) {
        (key, String::new())
    } else {
        ("key", format!(r#" name="{}""#, escape(key)))
    };

    out.push_str(&format!(r#"<{tag}{name_attr} type="{kind}">"#));
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&escape(s.as_str())),
        Value::Array(items) => {
            for item in items {
                render_element(out, LIST_ITEM, item);
            }
        }
        Value::Object(fields) => {
            for (field, item) in fields {
                render_element(out, field, item);
            }
        }
    }
    out.push_str(&format!("</{tag}>"));
}

/// Whether `key` can be used verbatim as an element name
fn is_xml_name(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.to_ascii_lowercase().starts_with("xml")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::FunctionDefinition;

    #[test]
    fn decodes_tool_call_tree() {
        let value = decode(
            "<tool_call><tool_name>search</tool_name><parameters><q>rust</q><limit>5</limit></parameters></tool_call>",
        )
        .unwrap();

        assert_eq!(
            value,
            json!({"tool_call": {"tool_name": "search", "parameters": {"q": "rust", "limit": "5"}}})
        );
    }

    #[test]
    fn attributes_and_mixed_text() {
        let value = decode(r#"<a><b type="int">3</b><c/><d></d></a>"#).unwrap();
        assert_eq!(value, json!({"a": {"b": {"@type": "int", "#text": "3"}, "c": null, "d": null}}));
    }

    #[test]
    fn repeated_children_become_arrays() {
        let value = decode("<list><item>1</item><item>2</item><item>3</item></list>").unwrap();
        assert_eq!(value, json!({"list": {"item": ["1", "2", "3"]}}));
    }

    #[test]
    fn entities_are_unescaped() {
        let value = decode("<p>a &lt; b &amp;&amp; c</p>").unwrap();
        assert_eq!(value, json!({"p": "a < b && c"}));
    }

    #[test]
    fn rejects_mismatched_and_unclosed() {
        assert!(matches!(decode("<a><b></a>"), Err(ResolveError::InvalidXml { .. })));
        assert!(matches!(decode("<a><b>"), Err(ResolveError::InvalidXml { .. })));
        assert!(matches!(decode("<a/><b/>"), Err(ResolveError::InvalidXml { .. })));
        assert!(matches!(decode("plain"), Err(ResolveError::InvalidXml { .. })));
    }

    #[test]
    fn renders_typed_elements() {
        let tools = vec![ToolDefinition {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: "get_weather".to_owned(),
                description: Some("Weather <now>".to_owned()),
                parameters: Some(json!({"required": ["city"], "strict": true})),
            },
        }];

        let xml = render_tools(&tools);
        assert!(xml.starts_with(r#"<tools><item type="dict">"#));
        assert!(xml.contains(r#"<name type="str">get_weather</name>"#));
        assert!(xml.contains(r#"<description type="str">Weather &lt;now&gt;</description>"#));
        assert!(xml.contains(r#"<required type="list"><item type="str">city</item></required>"#));
        assert!(xml.contains(r#"<strict type="bool">true</strict>"#));
        assert!(xml.ends_with("</tools>"));
    }

    #[test]
    fn invalid_names_use_key_element() {
        let mut out = String::new();
        render_element(&mut out, "1st", &json!(1));
        assert_eq!(out, r#"<key name="1st" type="int">1</key>"#);
    }

    #[test]
    fn rendered_tools_decode_back() {
        let tools = vec![ToolDefinition {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: "ping".to_owned(),
                description: None,
                parameters: None,
            },
        }];

        let value = decode(&render_tools(&tools)).unwrap();
        assert_eq!(value["tools"]["item"]["function"]["name"]["#text"], "ping");
    }
}
