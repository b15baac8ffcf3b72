//! Core types for fnforge

use crate::error::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A model-issued request to invoke a capability. Arguments are untrusted
/// and must pass schema validation before any handler runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a dispatched tool call. Exactly one per ToolCall.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success { payload: Value },
    Failure { kind: FailureKind, message: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub outcome: Outcome,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: Outcome::Success { payload },
        }
    }

    pub fn failure(call_id: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Failure { kind, .. } => Some(*kind),
            Outcome::Success { .. } => None,
        }
    }

    /// The string appended to the conversation as a tool observation.
    pub fn observation(&self) -> String {
        match &self.outcome {
            Outcome::Success { payload } => payload.to_string(),
            Outcome::Failure { kind, message } => format!("error[{}]: {}", kind, message),
        }
    }
}

/// Capability definition as presented to the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A deployed server-side function owned by a project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub code: String,
    pub updated_at: DateTime<Utc>,
}

/// A static site file owned by a project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteFile {
    pub path: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Git synchronization settings for a project. Baselines map function
/// names to the content hash recorded at the last selective sync; they are
/// the reference point for three-way conflict classification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GitConfig {
    pub repo_url: String,
    pub branch: String,
    pub token: String,
    pub functions_dir: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub baselines: HashMap<String, String>,
}

impl GitConfig {
    pub fn new(
        repo_url: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
        functions_dir: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: branch.into(),
            token: token.into(),
            functions_dir: functions_dir.into(),
            last_synced_at: None,
            baselines: HashMap::new(),
        }
    }
}

/// A primitive mutation inside a Plan. Create overwrites and delete
/// tolerates a missing target, so a partially applied plan can be
/// re-confirmed safely.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    CreateFunction { name: String, code: String },
    UpdateFunction { name: String, code: String },
    DeleteFunction { name: String },
}

impl PlanOp {
    pub fn target(&self) -> &str {
        match self {
            PlanOp::CreateFunction { name, .. }
            | PlanOp::UpdateFunction { name, .. }
            | PlanOp::DeleteFunction { name } => name,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PlanOp::CreateFunction { name, .. } => format!("create function '{}'", name),
            PlanOp::UpdateFunction { name, .. } => format!("update function '{}'", name),
            PlanOp::DeleteFunction { name } => format!("delete function '{}'", name),
        }
    }
}

/// An immutable, fingerprinted list of operations produced by an analysis
/// phase. Valid for confirmation only while the fingerprint still matches
/// live state and the expiry has not passed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub fingerprint: String,
    pub intent: String,
    pub targets: Vec<String>,
    pub ops: Vec<PlanOp>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
