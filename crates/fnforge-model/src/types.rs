//! Request and streaming-event types for the model collaborator

use fnforge_core::{ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One message of the active conversation path, flattened for the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
}

impl ContextMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelRequest {
    pub context: Vec<ContextMessage>,
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ModelRequest {
    fn default() -> Self {
        Self {
            context: Vec::new(),
            tools: Vec::new(),
            system: None,
            max_tokens: Some(8192),
        }
    }
}

/// Incremental output from the provider.
#[derive(Clone, Debug)]
pub enum ModelEvent {
    TextDelta(String),
    ToolCallStart { id: String, name: String },
    ToolCallArguments { id: String, fragment: String },
    ToolCallEnd { id: String },
    Done { stop_reason: Option<String> },
}

/// Fully assembled response: final text plus zero or more tool calls.
#[derive(Clone, Debug, Default)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
}

/// Assembles a `ModelReply` from a stream of events. Malformed tool-call
/// argument JSON is preserved as a raw string value so schema validation
/// downstream reports it as an ordinary InvalidArguments failure.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    reply: ModelReply,
    pending: Option<(String, String, String)>,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ModelEvent) {
        match event {
            ModelEvent::TextDelta(text) => self.reply.text.push_str(&text),
            ModelEvent::ToolCallStart { id, name } => {
                self.flush_pending();
                self.pending = Some((id, name, String::new()));
            }
            ModelEvent::ToolCallArguments { id: _, fragment } => {
                if let Some((_, _, buffer)) = self.pending.as_mut() {
                    buffer.push_str(&fragment);
                }
            }
            ModelEvent::ToolCallEnd { id: _ } => self.flush_pending(),
            ModelEvent::Done { stop_reason } => {
                self.flush_pending();
                self.reply.stop_reason = stop_reason;
            }
        }
    }

    fn flush_pending(&mut self) {
        if let Some((id, name, raw)) = self.pending.take() {
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&raw).unwrap_or(Value::String(raw))
            };
            self.reply.tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    pub fn finish(mut self) -> ModelReply {
        self.flush_pending();
        self.reply
    }
}
