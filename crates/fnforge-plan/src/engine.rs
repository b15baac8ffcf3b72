//! Analyze/confirm engine

use crate::fingerprint::state_fingerprint;
use chrono::{Duration, Utc};
use fnforge_core::{Compiler, Error, Plan, PlanOp, ProjectStore, Result, TargetLocks};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// One piece of a decomposition. When `code` is omitted the piece starts as
/// a copy of the original, for the caller to trim afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanPiece {
    pub name: String,
    pub code: Option<String>,
}

/// Result of a confirm call. `applied` counts operations that committed
/// before the first failure; with idempotent ops the caller may retry
/// confirm after fixing the cause.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyReport {
    pub plan_id: String,
    pub applied: usize,
    pub total: usize,
    pub failed_op: Option<String>,
    pub error: Option<String>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.applied == self.total && self.error.is_none()
    }
}

pub struct PlanEngine {
    store: Arc<dyn ProjectStore>,
    compiler: Arc<dyn Compiler>,
    locks: Arc<TargetLocks>,
    ttl: Duration,
}

impl PlanEngine {
    pub fn new(store: Arc<dyn ProjectStore>, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            store,
            compiler,
            locks: Arc::new(TargetLocks::new()),
            ttl: Duration::minutes(10),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lock through the same table the dispatcher uses, so the apply phase
    /// of a confirm excludes direct edits of the functions it touches.
    pub fn with_target_locks(mut self, locks: Arc<TargetLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Read-only analysis: split `name` into pieces. The resulting plan
    /// creates every piece, then deletes the original.
    pub async fn analyze_decompose(&self, name: &str, pieces: Vec<PlanPiece>) -> Result<Plan> {
        if pieces.is_empty() {
            return Err(Error::InvalidArguments(
                "decompose requires at least one piece".to_string(),
            ));
        }
        let original = self
            .store
            .get_function(name)
            .await
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;

        let mut ops = Vec::with_capacity(pieces.len() + 1);
        for piece in &pieces {
            if piece.name == name {
                return Err(Error::InvalidArguments(format!(
                    "piece '{}' collides with the decomposed function",
                    piece.name
                )));
            }
            let code = piece.code.clone().unwrap_or_else(|| {
                format!("// extracted from {}\n{}", name, original.code)
            });
            self.compiler.compile(&code).await?;
            ops.push(PlanOp::CreateFunction {
                name: piece.name.clone(),
                code,
            });
        }
        ops.push(PlanOp::DeleteFunction {
            name: name.to_string(),
        });

        let intent = json!({
            "kind": "decompose",
            "source": name,
            "pieces": pieces.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        })
        .to_string();

        self.persist(vec![name.to_string()], intent, ops).await
    }

    /// Read-only analysis: merge `names` into `into`. The resulting plan
    /// creates the merged function, then deletes the sources.
    pub async fn analyze_merge(
        &self,
        names: Vec<String>,
        into: String,
        code: Option<String>,
    ) -> Result<Plan> {
        if names.len() < 2 {
            return Err(Error::InvalidArguments(
                "merge requires at least two source functions".to_string(),
            ));
        }

        let mut sources = Vec::with_capacity(names.len());
        for name in &names {
            let record = self
                .store
                .get_function(name)
                .await
                .ok_or_else(|| Error::FunctionNotFound(name.clone()))?;
            sources.push(record);
        }

        let merged = match code {
            Some(code) => code,
            None => sources
                .iter()
                .map(|s| s.code.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        self.compiler.compile(&merged).await?;

        let mut ops = vec![PlanOp::CreateFunction {
            name: into.clone(),
            code: merged,
        }];
        for name in &names {
            if *name != into {
                ops.push(PlanOp::DeleteFunction { name: name.clone() });
            }
        }

        let intent = json!({ "kind": "merge", "sources": names, "into": into }).to_string();
        self.persist(names, intent, ops).await
    }

    async fn persist(&self, targets: Vec<String>, intent: String, ops: Vec<PlanOp>) -> Result<Plan> {
        let fingerprint = self.fingerprint_targets(&targets, &intent).await;
        let now = Utc::now();
        let plan = Plan {
            id: format!("plan_{}", uuid::Uuid::new_v4().simple()),
            fingerprint,
            intent,
            targets,
            ops,
            created_at: now,
            expires_at: now + self.ttl,
        };
        info!(
            plan_id = %plan.id,
            ops = plan.ops.len(),
            "plan created"
        );
        self.store.put_plan(plan.clone()).await;
        Ok(plan)
    }

    async fn fingerprint_targets(&self, targets: &[String], intent: &str) -> String {
        let mut pairs = Vec::with_capacity(targets.len());
        for name in targets {
            let code = self.store.get_function(name).await.map(|f| f.code);
            pairs.push((name.clone(), code));
        }
        state_fingerprint(&pairs, intent)
    }

    /// Re-fingerprint live state and, on a match, apply the plan's
    /// operations strictly in order. Already-applied operations are not
    /// undone on a later failure; the report carries the index reached.
    pub async fn confirm(&self, plan_id: &str) -> Result<ApplyReport> {
        let plan = self
            .store
            .get_plan(plan_id)
            .await
            .ok_or_else(|| Error::PlanExpired(plan_id.to_string()))?;

        // Hold every touched function's lock from the fingerprint check
        // through the last applied op; an edit of a target either lands
        // before the check (and stales the plan) or waits until after.
        let keys: Vec<String> = plan
            .targets
            .iter()
            .map(String::as_str)
            .chain(plan.ops.iter().map(PlanOp::target))
            .map(|name| format!("function:{}", name))
            .collect();
        let _guards = self.locks.acquire(&keys).await;

        if Utc::now() > plan.expires_at {
            self.store.delete_plan(plan_id).await;
            return Err(Error::PlanExpired(plan_id.to_string()));
        }

        let current = self.fingerprint_targets(&plan.targets, &plan.intent).await;
        if current != plan.fingerprint {
            return Err(Error::PlanStale(format!(
                "targets of plan {} changed since analysis; re-analyze",
                plan_id
            )));
        }

        let total = plan.ops.len();
        for (index, op) in plan.ops.iter().enumerate() {
            if let Err(e) = self.apply_op(op).await {
                warn!(plan_id, index, op = %op.describe(), error = %e, "plan apply stopped");
                return Ok(ApplyReport {
                    plan_id: plan_id.to_string(),
                    applied: index,
                    total,
                    failed_op: Some(op.describe()),
                    error: Some(e.to_string()),
                });
            }
        }

        // Consumed: a confirmed plan cannot be confirmed again.
        self.store.delete_plan(plan_id).await;
        info!(plan_id, total, "plan applied");
        Ok(ApplyReport {
            plan_id: plan_id.to_string(),
            applied: total,
            total,
            failed_op: None,
            error: None,
        })
    }

    async fn apply_op(&self, op: &PlanOp) -> Result<()> {
        match op {
            PlanOp::CreateFunction { name, code } => {
                self.store.upsert_function(name, code).await;
                Ok(())
            }
            PlanOp::UpdateFunction { name, code } => {
                if self.store.get_function(name).await.is_none() {
                    return Err(Error::FunctionNotFound(name.clone()));
                }
                self.store.upsert_function(name, code).await;
                Ok(())
            }
            PlanOp::DeleteFunction { name } => {
                self.store.delete_function(name).await;
                Ok(())
            }
        }
    }
}
