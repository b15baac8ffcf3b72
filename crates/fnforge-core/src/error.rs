//! Error types for fnforge

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classification carried back to the model as part of a tool
/// observation. The model is expected to self-correct on most of these
/// (fix arguments, re-analyze a stale plan) without terminating the turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownCapability,
    InvalidArguments,
    ConfirmationRequired,
    Timeout,
    HandlerError,
    PlanStale,
    PlanExpired,
    RemoteAccessError,
    CompileError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UnknownCapability => "unknown_capability",
            FailureKind::InvalidArguments => "invalid_arguments",
            FailureKind::ConfirmationRequired => "confirmation_required",
            FailureKind::Timeout => "timeout",
            FailureKind::HandlerError => "handler_error",
            FailureKind::PlanStale => "plan_stale",
            FailureKind::PlanExpired => "plan_expired",
            FailureKind::RemoteAccessError => "remote_access_error",
            FailureKind::CompileError => "compile_error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("deadline of {0:?} exceeded")]
    Timeout(std::time::Duration),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("plan is stale: {0}")]
    PlanStale(String),

    #[error("plan expired or unknown: {0}")]
    PlanExpired(String),

    #[error("remote access failed: {0}")]
    RemoteAccess(String),

    #[error("compile failed: {0}")]
    Compile(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("model provider failed: {0}")]
    Model(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteAccess(message.into())
    }

    /// Map to the observation-level failure classification.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::UnknownCapability(_) => FailureKind::UnknownCapability,
            Error::InvalidArguments(_) => FailureKind::InvalidArguments,
            Error::ConfirmationRequired(_) => FailureKind::ConfirmationRequired,
            Error::Timeout(_) => FailureKind::Timeout,
            Error::PlanStale(_) => FailureKind::PlanStale,
            Error::PlanExpired(_) => FailureKind::PlanExpired,
            Error::RemoteAccess(_) => FailureKind::RemoteAccessError,
            Error::Compile(_) => FailureKind::CompileError,
            Error::Handler(_)
            | Error::FunctionNotFound(_)
            | Error::DuplicateCapability(_)
            | Error::Model(_)
            | Error::Json(_) => FailureKind::HandlerError,
        }
    }
}
