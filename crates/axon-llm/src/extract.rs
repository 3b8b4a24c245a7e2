//! Locating structured payloads inside free-form model output
//!
//! Detection is an ordered list of syntax detectors. Each one either finds
//! a candidate payload or declines; the first to match wins. The resolver
//! walks the same list so that a candidate which fails to decode can fall
//! through to the next detector.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Opening marker of an XML tool call block
pub const TOOL_CALL_OPEN: &str = "<tool_call>";

/// Closing marker of an XML tool call block
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// Grammar a payload was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    /// `<tool_call>` … `</tool_call>` block
    XmlToolCall,
    /// JSON inside a triple-backtick `json` fence
    JsonFenced,
    /// First balanced JSON object in the text
    JsonBare,
    /// `name({...})` rewritten into the JSON action shape
    CallExpression,
    /// Plain prose
    None,
}

impl SyntaxKind {
    /// Label used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XmlToolCall => "xml-tool-call",
            Self::JsonFenced => "json-fenced",
            Self::JsonBare => "json-bare",
            Self::CallExpression => "call-expression",
            Self::None => "none",
        }
    }
}

/// Substring of model output identified as carrying structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    /// Grammar of the payload
    pub kind: SyntaxKind,
    /// Text to decode; the whole output for [`SyntaxKind::None`]
    pub payload: String,
}

type Detector = fn(&str) -> Option<String>;

/// Detectors in priority order
const DETECTORS: [(SyntaxKind, Detector); 4] = [
    (SyntaxKind::XmlToolCall, detect_xml),
    (SyntaxKind::JsonFenced, detect_fenced),
    (SyntaxKind::JsonBare, detect_bare),
    (SyntaxKind::CallExpression, detect_call_expression),
];

/// First matching payload, or the whole text as [`SyntaxKind::None`]
pub fn extract(raw: &str) -> ExtractedPayload {
    candidates(raw).next().unwrap_or_else(|| ExtractedPayload {
        kind: SyntaxKind::None,
        payload: raw.to_owned(),
    })
}

/// Every detector match, in priority order
pub fn candidates(raw: &str) -> impl Iterator<Item = ExtractedPayload> + '_ {
    DETECTORS.iter().filter_map(move |(kind, detect)| {
        detect(raw).map(|payload| ExtractedPayload { kind: *kind, payload })
    })
}

/// Whether text that produced no usable payload still looks like an
/// attempt at structure rather than prose
pub fn looks_structured(raw: &str) -> bool {
    raw.contains(TOOL_CALL_OPEN)
        || detect_fenced(raw).is_some()
        || call_expression().is_match(raw)
        || opens_with_object(raw)
}

/// Whether the output, past any `[[...]]` annotation, opens with `{`
pub fn opens_with_object(raw: &str) -> bool {
    strip_annotation(raw).trim_start().starts_with('{')
}

/// Find the first complete `<tool_call>` block
fn detect_xml(raw: &str) -> Option<String> {
    let start = raw.find(TOOL_CALL_OPEN)?;
    let end = raw[start..].find(TOOL_CALL_CLOSE)? + start + TOOL_CALL_CLOSE.len();
    Some(raw[start..end].to_owned())
}

fn fenced_json() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("must be valid regex"))
}

fn detect_fenced(raw: &str) -> Option<String> {
    fenced_json()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

fn annotation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)^\s*\[\[.*?\]\]").expect("must be valid regex"))
}

fn brace_line_breaks() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"[ \t]*\r?\n\s*([{}])").expect("must be valid regex"),
            Regex::new(r"([{}])[ \t]*\r?\n\s*").expect("must be valid regex"),
        ]
    })
}

/// Drop a leading `[[...]]` annotation
fn strip_annotation(raw: &str) -> &str {
    annotation().find(raw).map_or(raw, |m| &raw[m.end()..])
}

fn detect_bare(raw: &str) -> Option<String> {
    let [before, after] = brace_line_breaks();
    let normalized = before.replace_all(raw, "$1");
    let normalized = after.replace_all(&normalized, "$1");

    let text = strip_annotation(&normalized);
    let start = text.find('{')?;
    let text = &text[start..];

    let end = balanced_object_end(text).or_else(|| text.rfind('}').map(|i| i + 1))?;
    Some(text[..end].to_owned())
}

/// Byte offset just past the `}` closing the object that opens `text`
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn call_expression() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_.]*)\((\s*(?:\{.*\})?\s*)\)\s*;?\s*$")
            .expect("must be valid regex")
    })
}

/// Rewrite `name({...})` into the JSON action shape
fn detect_call_expression(raw: &str) -> Option<String> {
    let caps = call_expression().captures(raw)?;
    let name = Value::String(caps[1].to_owned());
    let args = caps[2].trim();
    let args = if args.is_empty() { "{}" } else { args };

    Some(format!(
        r#"{{"action":"tool_call","action_data":{{"name":{name},"arguments":{args}}}}}"#
    ))
}

/// Remove `<message>` wrappers and turn `<thought>` tags into emphasis
///
/// Runs until nothing changes, so applying it twice equals applying it once.
pub fn strip_framing_tags(text: &str) -> String {
    const REPLACEMENTS: [(&str, &str); 8] = [
        ("<message>\n", ""),
        ("<message>", ""),
        ("</message>\n", ""),
        ("</message>", ""),
        ("<thought>\n", "*"),
        ("<thought>", "*"),
        ("</thought>\n", "*"),
        ("</thought>", "*"),
    ];

    let mut current = text.to_owned();
    loop {
        let next = REPLACEMENTS
            .iter()
            .fold(current.clone(), |acc, (from, to)| acc.replace(from, to));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Plain-text portion of a complete output
///
/// A complete `<tool_call>` block and everything after it is dropped.
pub fn plain_text(raw: &str) -> String {
    let visible = match detect_xml(raw) {
        Some(_) => raw.find(TOOL_CALL_OPEN).map_or(raw, |i| &raw[..i]),
        None => raw,
    };
    strip_framing_tags(visible)
}
