//! ScriptedProvider — deterministic model responses for testing
//!
//! Each request pops the next step from the script; an exhausted script
//! falls back to the default step. `constant` repeats one step forever,
//! which is how the bounded-loop tests drive an agent that never stops
//! asking for tools.

use crate::provider::{ModelError, ModelProvider, ModelResult, ModelStream};
use crate::types::{ModelEvent, ModelRequest};
use async_stream::stream;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Text-only response (ends the turn).
    Text(String),
    /// One or more tool calls, no text.
    ToolCalls(Vec<(String, Value)>),
    /// Text followed by tool calls.
    TextThenTools {
        text: String,
        calls: Vec<(String, Value)>,
    },
    /// A tool call whose argument fragments do not parse as JSON.
    MalformedToolCall { name: String, raw_arguments: String },
    /// Provider-level failure.
    Fail(String),
}

pub struct ScriptedProvider {
    steps: Mutex<Vec<ScriptStep>>,
    default_step: ScriptStep,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    /// Steps consumed in order; exhausted script returns a stock text reply.
    pub fn sequence(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps),
            default_step: ScriptStep::Text("(script exhausted)".to_string()),
            calls: Mutex::new(0),
        }
    }

    /// The same step on every request.
    pub fn constant(step: ScriptStep) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            default_step: step,
            calls: Mutex::new(0),
        }
    }

    pub async fn call_count(&self) -> usize {
        *self.calls.lock().await
    }

    async fn next_step(&self) -> ScriptStep {
        *self.calls.lock().await += 1;
        let mut steps = self.steps.lock().await;
        if steps.is_empty() {
            self.default_step.clone()
        } else {
            steps.remove(0)
        }
    }
}

fn call_id(index: usize) -> String {
    format!(
        "call_{}_{}",
        index,
        uuid::Uuid::new_v4().simple().to_string().split_at(8).0
    )
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn request(
        &self,
        _request: ModelRequest,
        _cancel: Option<CancellationToken>,
    ) -> ModelResult<ModelStream> {
        let step = self.next_step().await;

        if let ScriptStep::Fail(message) = step {
            return Err(ModelError::RequestFailed(message));
        }

        Ok(Box::pin(stream! {
            match step {
                ScriptStep::Text(text) => {
                    // Chunked like a real stream.
                    for chunk in text.as_bytes().chunks(16) {
                        yield Ok(ModelEvent::TextDelta(String::from_utf8_lossy(chunk).to_string()));
                    }
                    yield Ok(ModelEvent::Done { stop_reason: Some("end_turn".to_string()) });
                }
                ScriptStep::ToolCalls(calls) => {
                    for (index, (name, args)) in calls.into_iter().enumerate() {
                        let id = call_id(index);
                        yield Ok(ModelEvent::ToolCallStart { id: id.clone(), name });
                        let raw = args.to_string();
                        yield Ok(ModelEvent::ToolCallArguments { id: id.clone(), fragment: raw });
                        yield Ok(ModelEvent::ToolCallEnd { id });
                    }
                    yield Ok(ModelEvent::Done { stop_reason: Some("tool_use".to_string()) });
                }
                ScriptStep::TextThenTools { text, calls } => {
                    yield Ok(ModelEvent::TextDelta(text));
                    for (index, (name, args)) in calls.into_iter().enumerate() {
                        let id = call_id(index);
                        yield Ok(ModelEvent::ToolCallStart { id: id.clone(), name });
                        yield Ok(ModelEvent::ToolCallArguments { id: id.clone(), fragment: args.to_string() });
                        yield Ok(ModelEvent::ToolCallEnd { id });
                    }
                    yield Ok(ModelEvent::Done { stop_reason: Some("tool_use".to_string()) });
                }
                ScriptStep::MalformedToolCall { name, raw_arguments } => {
                    let id = call_id(0);
                    yield Ok(ModelEvent::ToolCallStart { id: id.clone(), name });
                    yield Ok(ModelEvent::ToolCallArguments { id: id.clone(), fragment: raw_arguments });
                    yield Ok(ModelEvent::ToolCallEnd { id });
                    yield Ok(ModelEvent::Done { stop_reason: Some("tool_use".to_string()) });
                }
                ScriptStep::Fail(_) => unreachable!("handled before streaming"),
            }
        }))
    }
}
