//! Fnforge Model - Language-model collaborator contract with streaming

pub mod provider;
pub mod scripted;
pub mod types;

pub use provider::{ModelError, ModelProvider, ModelResult, ModelStream};
pub use scripted::{ScriptStep, ScriptedProvider};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
