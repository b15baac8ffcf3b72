//! Agent runtime - the tool-use loop over a branching conversation
//!
//! One turn: append the user message, then alternate model requests and
//! tool dispatch until the model answers in plain text, the cycle ceiling
//! is hit, or the caller cancels. Every exit path appends a final assistant
//! message, so the conversation never ends on a dangling tool observation.

use crate::events::{AbortReason, AgentEvent};
use fnforge_capabilities::Dispatcher;
use fnforge_core::{ConversationRegistry, Role, ToolCall, ToolResult};
use fnforge_model::{ContextMessage, ModelProvider, ModelRequest, ReplyAccumulator};
use futures::{stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct AgentConfig {
    /// Model requests allowed per turn.
    pub max_cycles: usize,
    /// Tool calls dispatched concurrently within one cycle.
    pub max_concurrent_calls: usize,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_cycles: 16,
            max_concurrent_calls: 4,
            system_prompt: None,
            max_tokens: Some(8192),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    Done,
    Aborted(AbortReason),
}

/// Final state of a completed `run_turn` call.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub final_message: String,
    pub cycles: usize,
}

pub struct AgentRuntime {
    provider: Arc<dyn ModelProvider>,
    dispatcher: Arc<Dispatcher>,
    conversations: Arc<ConversationRegistry>,
    config: AgentConfig,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        dispatcher: Arc<Dispatcher>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            conversations: Arc::new(ConversationRegistry::new()),
            config,
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationRegistry> {
        &self.conversations
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run a turn without cancellation support.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        user_message: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> TurnOutcome {
        let cancel = CancellationToken::new();
        self.run_turn_cancellable(conversation_id, user_message, events, cancel)
            .await
    }

    /// Run a turn, stopping between steps when `cancel` fires. Cancellation
    /// is cooperative: a handler already inside the dispatcher runs to its
    /// deadline, but no further model request or dispatch starts.
    pub async fn run_turn_cancellable(
        &self,
        conversation_id: &str,
        user_message: &str,
        events: mpsc::Sender<AgentEvent>,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let conversation = self.conversations.get_or_create(conversation_id);
        conversation
            .write()
            .await
            .append(Role::User, user_message);

        let mut cycles = 0;

        loop {
            if cancel.is_cancelled() {
                return self
                    .abort(&conversation, &events, AbortReason::Cancelled, cycles)
                    .await;
            }

            if cycles >= self.config.max_cycles {
                warn!(conversation_id, cycles, "cycle ceiling reached");
                return self
                    .abort(&conversation, &events, AbortReason::CycleCeiling, cycles)
                    .await;
            }
            cycles += 1;

            let request = self.build_request(&conversation).await;
            let stream = match self
                .provider
                .request(request, Some(cancel.clone()))
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    let note = format!("I was unable to complete this request: {}", e);
                    warn!(conversation_id, error = %e, "model request failed");
                    let _ = events.send(AgentEvent::Error(e.to_string())).await;
                    conversation
                        .write()
                        .await
                        .append(Role::Assistant, note.clone());
                    let _ = events.send(AgentEvent::Done { cycles }).await;
                    return TurnOutcome {
                        status: TurnStatus::Done,
                        final_message: note,
                        cycles,
                    };
                }
            };

            let (reply, cancelled) = self.drain_stream(stream, &events, &cancel).await;

            if cancelled {
                if !reply.text.is_empty() {
                    conversation
                        .write()
                        .await
                        .append(Role::Assistant, reply.text.clone());
                }
                return self
                    .abort(&conversation, &events, AbortReason::Cancelled, cycles)
                    .await;
            }

            if !reply.text.is_empty() {
                conversation
                    .write()
                    .await
                    .append(Role::Assistant, reply.text.clone());
            }

            if reply.tool_calls.is_empty() {
                info!(conversation_id, cycles, "turn complete");
                let _ = events.send(AgentEvent::Done { cycles }).await;
                return TurnOutcome {
                    status: TurnStatus::Done,
                    final_message: reply.text,
                    cycles,
                };
            }

            let results = self.dispatch_calls(reply.tool_calls, &events).await;
            let mut guard = conversation.write().await;
            for result in &results {
                guard.append(Role::Tool, result.observation());
            }
            drop(guard);
            debug!(conversation_id, cycle = cycles, "tool results appended");
        }
    }

    async fn build_request(
        &self,
        conversation: &Arc<tokio::sync::RwLock<fnforge_core::Conversation>>,
    ) -> ModelRequest {
        let guard = conversation.read().await;
        let context = guard
            .active_path()
            .iter()
            .map(|m| ContextMessage::new(m.role.as_str(), m.content.clone()))
            .collect();
        ModelRequest {
            context,
            tools: self.dispatcher.registry().definitions(),
            system: self.config.system_prompt.clone(),
            max_tokens: self.config.max_tokens,
        }
    }

    /// Forward stream events while assembling the reply. Returns the reply
    /// plus whether cancellation interrupted the stream.
    async fn drain_stream(
        &self,
        stream: fnforge_model::ModelStream,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> (fnforge_model::ModelReply, bool) {
        let mut accumulator = ReplyAccumulator::new();
        let mut cancelled = false;
        tokio::pin!(stream);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                event = stream.next() => {
                    match event {
                        Some(Ok(event)) => {
                            match &event {
                                fnforge_model::ModelEvent::TextDelta(text) => {
                                    let _ = events.send(AgentEvent::TextDelta(text.clone())).await;
                                }
                                fnforge_model::ModelEvent::ToolCallStart { id, name } => {
                                    let _ = events
                                        .send(AgentEvent::ToolCallStart {
                                            id: id.clone(),
                                            name: name.clone(),
                                        })
                                        .await;
                                }
                                fnforge_model::ModelEvent::ToolCallArguments { id, fragment } => {
                                    let _ = events
                                        .send(AgentEvent::ToolCallArguments {
                                            id: id.clone(),
                                            fragment: fragment.clone(),
                                        })
                                        .await;
                                }
                                _ => {}
                            }
                            accumulator.push(event);
                        }
                        Some(Err(e)) => {
                            let _ = events.send(AgentEvent::Error(e.to_string())).await;
                        }
                        None => break,
                    }
                }
            }
        }

        (accumulator.finish(), cancelled)
    }

    /// Dispatch a cycle's tool calls, up to `max_concurrent_calls` at a
    /// time. Results come back in call order regardless of completion
    /// order, so observations land deterministically.
    async fn dispatch_calls(
        &self,
        calls: Vec<ToolCall>,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Vec<ToolResult> {
        let names: Vec<String> = calls.iter().map(|c| c.name.clone()).collect();
        for call in &calls {
            let _ = events
                .send(AgentEvent::ToolDispatched {
                    id: call.id.clone(),
                    name: call.name.clone(),
                })
                .await;
        }

        let dispatcher = self.dispatcher.clone();
        let mut indexed: Vec<(usize, ToolResult)> = stream::iter(calls.into_iter().enumerate())
            .map(|(index, call)| {
                let dispatcher = dispatcher.clone();
                async move { (index, dispatcher.dispatch(call).await) }
            })
            .buffer_unordered(self.config.max_concurrent_calls.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let mut results = Vec::with_capacity(indexed.len());
        for (index, result) in indexed {
            let _ = events
                .send(AgentEvent::ToolResult {
                    id: result.call_id.clone(),
                    name: names[index].clone(),
                    observation: result.observation(),
                    is_failure: result.is_failure(),
                })
                .await;
            results.push(result);
        }
        results
    }

    /// Close the turn with a synthesized assistant message so the active
    /// path never ends on a tool observation.
    async fn abort(
        &self,
        conversation: &Arc<tokio::sync::RwLock<fnforge_core::Conversation>>,
        events: &mpsc::Sender<AgentEvent>,
        reason: AbortReason,
        cycles: usize,
    ) -> TurnOutcome {
        let note = match reason {
            AbortReason::Cancelled => "This response was interrupted.".to_string(),
            AbortReason::CycleCeiling => {
                "I stopped after reaching the step limit for a single request; \
                 the work so far has been applied."
                    .to_string()
            }
        };
        conversation
            .write()
            .await
            .append(Role::Assistant, note.clone());
        let _ = events.send(AgentEvent::Aborted { reason }).await;
        TurnOutcome {
            status: TurnStatus::Aborted(reason),
            final_message: note,
            cycles,
        }
    }
}
