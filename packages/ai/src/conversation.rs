// ABOUTME: Conversation transcript types shared by the gateway and the task loop
// ABOUTME: Turns, tool calls, tool results, and model output parts

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured, named request emitted by the model to invoke one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id the paired tool result must echo
    pub id: String,
    /// Action name; must belong to the closed schema or is treated as unknown
    pub name: String,
    /// Raw arguments as produced by the model
    pub args: Value,
}

/// Response to a single tool call, paired by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
}

/// One entry in a conversation transcript.
///
/// Invariant: every tool call carried by an `Assistant` turn is answered in
/// the immediately following `ToolResults` turn by exactly one result with a
/// matching id, before another model call is issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    /// System instruction (fixed prefix or injected guidance)
    System { text: String },
    /// The task statement
    Task { text: String },
    /// Model output: optional text plus zero or more tool calls
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Tool responses keyed by call id
    ToolResults { results: Vec<ToolResult> },
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Turn::System { text: text.into() }
    }

    pub fn task(text: impl Into<String>) -> Self {
        Turn::Task { text: text.into() }
    }

    /// Approximate content size in characters, for context budgeting
    pub fn content_chars(&self) -> usize {
        match self {
            Turn::System { text } | Turn::Task { text } => text.len(),
            Turn::Assistant { text, tool_calls } => {
                let call_chars: usize = tool_calls
                    .iter()
                    .map(|call| call.name.len() + call.args.to_string().len())
                    .sum();
                text.as_deref().map_or(0, str::len) + call_chars
            }
            Turn::ToolResults { results } => results.iter().map(|r| r.content.len()).sum(),
        }
    }
}

/// A piece of model output: plain text or a typed tool call
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(ToolCall),
}

impl Part {
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Part::FunctionCall(call) => Some(call),
            Part::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::FunctionCall(_) => None,
        }
    }
}
