//! Model provider trait
//!
//! The provider is treated as unreliable: requests may fail, time out, or
//! stream malformed tool-call arguments. None of those are process faults;
//! the agent loop and dispatcher degrade them into ordinary observations.

use crate::types::{ModelEvent, ModelRequest};
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,
}

pub type ModelStream = Pin<Box<dyn Stream<Item = ModelResult<ModelEvent>> + Send>>;

#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Stream a response for the given context and capability definitions.
    /// If `cancel` is provided and triggered, the stream ends with
    /// `ModelError::Cancelled`.
    async fn request(
        &self,
        request: ModelRequest,
        cancel: Option<CancellationToken>,
    ) -> ModelResult<ModelStream>;
}
