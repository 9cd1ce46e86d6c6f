//! Agent replies and their conversion to plain text.

use std::fmt;

use serde_json::Value;

/// Raw reply from a chat model: plain text, or a structured payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    Text(String),
    Structured(Value),
}

impl fmt::Display for AgentReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Structured(value) => write!(f, "{value}"),
        }
    }
}

/// Values that can expose a textual body.
pub trait TextContent {
    fn text_content(&self) -> Option<String>;
}

const TEXT_FIELDS: [&str; 4] = ["result", "content", "text", "message"];

impl TextContent for Value {
    fn text_content(&self) -> Option<String> {
        match self {
            Value::String(text) => Some(text.clone()),
            Value::Object(map) => TEXT_FIELDS
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Text of a reply. Structured replies fall back to their JSON rendering when
/// no text field is present.
pub fn coerce_to_text(reply: &AgentReply) -> String {
    match reply {
        AgentReply::Text(text) => text.clone(),
        AgentReply::Structured(value) => value.text_content().unwrap_or_else(|| reply.to_string()),
    }
}
