//! Fnforge Agent - the orchestrating tool-use loop
//!
//! Drives a model provider against the capability dispatcher over a
//! branching conversation, streaming progress events to the caller. The
//! loop is bounded, cancellable, and always leaves the conversation on an
//! assistant message.

pub mod events;
pub mod runtime;

pub use events::{AbortReason, AgentEvent};
pub use runtime::{AgentConfig, AgentRuntime, TurnOutcome, TurnStatus};
