//! Model output parsing
//!
//! Turns raw, free-form model text into a structured [`Decision`]. This is
//! the one place where unstructured model output meets structured control
//! flow; everything downstream of the agent loop works with closed types.
//!
//! Two wire shapes are recognized, in order:
//!
//! 1. A JSON object embedded anywhere in the text, carrying either
//!    `{"final_answer": ...}` or `{"tool": "...", "input": "..."}`.
//! 2. Classic text markers: `Final Answer: ...` or
//!    `Action: ...` / `Action Input: ...` lines.
//!
//! Surrounding prose is tolerated and preserved as the decision's `thought`.
//! When one response carries both a tool call and a final answer, the
//! [`TieBreak`] policy decides; the default prefers termination.

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One structured decision extracted from a model response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// The model wants a tool invoked
    ToolCall {
        /// Name of the tool to invoke
        tool_name: String,
        /// Input to pass to the tool
        tool_input: String,
        /// Reasoning text surrounding the call
        thought: String,
    },

    /// The model is done and provides its answer
    FinalAnswer {
        /// The answer content
        content: String,
        /// Reasoning text surrounding the answer
        thought: String,
    },
}

/// Policy for responses that carry both a tool call and a final answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Prefer termination: the final answer wins
    #[default]
    FinalAnswerWins,
    /// Keep acting: the tool call wins
    ToolCallWins,
}

static FINAL_ANSWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*final[ \t]?answer[ \t]*:[ \t]*").expect("valid regex"));
static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*action[ \t]*:[ \t]*(?P<name>[^\r\n]*)").expect("valid regex"));
static ACTION_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*action[ \t]?input[ \t]*:[ \t]*").expect("valid regex"));
static MARKER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:thought|action(?:[ \t]?input)?|observation|final[ \t]?answer)[ \t]*:")
        .expect("valid regex")
});
static THOUGHT_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[ \t]*thought[ \t]*:[ \t]*").expect("valid regex"));

/// Parse a raw model response with the default tie-break policy
pub fn parse(raw: &str) -> Result<Decision, ParseError> {
    parse_with_policy(raw, TieBreak::default())
}

/// Parse a raw model response into a [`Decision`]
///
/// Pure: no side effects, no I/O. Returns [`ParseError`] when nothing
/// recognizable is present; the caller decides what an unparsable response
/// costs.
pub fn parse_with_policy(raw: &str, tie_break: TieBreak) -> Result<Decision, ParseError> {
    let mut final_answer: Option<(String, String)> = None; // (content, thought)
    let mut tool_call: Option<(String, String, String)> = None; // (name, input, thought)
    let mut saw_empty_tool_name = false;

    // JSON channel: any balanced object in the text that parses.
    for (start, value) in embedded_json_objects(raw) {
        let Some(obj) = value.as_object() else {
            continue;
        };

        if final_answer.is_none() {
            if let Some(answer) = obj.get("final_answer") {
                let thought = clean_thought(&raw[..start]);
                final_answer = Some((final_answer_content(answer), thought));
            }
        }

        if tool_call.is_none() {
            if let Some(name) = obj.get("tool").and_then(Value::as_str) {
                if name.trim().is_empty() {
                    saw_empty_tool_name = true;
                } else {
                    let input = obj.get("input").map(value_to_input).unwrap_or_default();
                    let thought = clean_thought(&raw[..start]);
                    tool_call = Some((name.trim().to_string(), input, thought));
                }
            }
        }
    }

    // Text-marker channel, for models that ignore the JSON instructions.
    if final_answer.is_none() {
        if let Some(m) = FINAL_ANSWER_RE.find(raw) {
            let content = raw[m.end()..].trim().to_string();
            let thought = clean_thought(&raw[..m.start()]);
            final_answer = Some((content, thought));
        }
    }

    if tool_call.is_none() {
        if let Some(captures) = ACTION_RE.captures(raw) {
            if let (Some(whole), Some(name_match)) = (captures.get(0), captures.name("name")) {
                let name = name_match.as_str().trim();

                if name.is_empty() {
                    saw_empty_tool_name = true;
                } else {
                    let input = extract_action_input(raw);
                    let thought = clean_thought(&raw[..whole.start()]);
                    tool_call = Some((name.to_string(), input, thought));
                }
            }
        }
    }

    match (final_answer, tool_call) {
        (Some((content, thought)), Some(_)) if tie_break == TieBreak::FinalAnswerWins => {
            Ok(Decision::FinalAnswer { content, thought })
        }
        (Some(_), Some((tool_name, tool_input, thought))) => Ok(Decision::ToolCall {
            tool_name,
            tool_input,
            thought,
        }),
        (Some((content, thought)), None) => Ok(Decision::FinalAnswer { content, thought }),
        (None, Some((tool_name, tool_input, thought))) => Ok(Decision::ToolCall {
            tool_name,
            tool_input,
            thought,
        }),
        (None, None) if saw_empty_tool_name => Err(ParseError::MissingToolName),
        (None, None) => Err(ParseError::Unrecognized),
    }
}

/// Find every balanced `{...}` substring that parses as JSON.
///
/// Brace matching is string-literal aware so braces inside JSON strings do
/// not unbalance the scan. On a parse failure the scan resumes one byte
/// later, so a valid object nested in non-JSON braces is still found.
fn embedded_json_objects(raw: &str) -> Vec<(usize, Value)> {
    let bytes = raw.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }

        match balanced_object_end(bytes, i) {
            Some(end) => match serde_json::from_str::<Value>(&raw[i..=end]) {
                Ok(value) => {
                    found.push((i, value));
                    i = end + 1;
                }
                Err(_) => i += 1,
            },
            None => i += 1,
        }
    }

    found
}

/// Byte index of the `}` closing the object opened at `start`, if any
fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }

    None
}

/// Content of a `final_answer` value.
///
/// The original wire format allows both a bare string and an object with a
/// `response` field; anything else is surfaced as compact JSON.
fn final_answer_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("response").and_then(Value::as_str) {
            Some(response) => response.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

fn value_to_input(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Everything between `Action Input:` and the next marker line (or the end)
fn extract_action_input(raw: &str) -> String {
    let Some(m) = ACTION_INPUT_RE.find(raw) else {
        return String::new();
    };

    let rest = &raw[m.end()..];
    let end = MARKER_LINE_RE.find(rest).map(|n| n.start()).unwrap_or(rest.len());
    let input = rest[..end].trim();

    // Models often quote the input; the quotes are not part of it.
    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        input[1..input.len() - 1].to_string()
    } else {
        input.to_string()
    }
}

fn clean_thought(text: &str) -> String {
    let trimmed = text.trim();
    THOUGHT_LABEL_RE.replace(trimmed, "").trim().to_string()
}
