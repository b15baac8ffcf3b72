//! Plan capabilities — decompose/merge analysis and plan confirmation

use crate::registry::Capability;
use fnforge_core::{Error, Plan, Result};
use fnforge_plan::{PlanEngine, PlanPiece};
use serde_json::{json, Value};
use std::sync::Arc;

fn plan_payload(plan: Plan) -> Result<Value> {
    let ops: Vec<String> = plan.ops.iter().map(|op| op.describe()).collect();
    Ok(json!({
        "plan_id": plan.id,
        "targets": plan.targets,
        "ops": ops,
        "expires_at": plan.expires_at,
    }))
}

pub struct DecomposeFunction {
    plans: Arc<PlanEngine>,
}

impl DecomposeFunction {
    pub fn new(plans: Arc<PlanEngine>) -> Self {
        Self { plans }
    }
}

#[async_trait::async_trait]
impl Capability for DecomposeFunction {
    fn name(&self) -> &str {
        "function.decompose"
    }

    fn description(&self) -> &str {
        "Analyze splitting a function into smaller pieces. Returns a plan; \
         nothing changes until plan.confirm is called with its id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Function to split" },
                "pieces": {
                    "type": "array",
                    "description": "New pieces; each has a name and optional code",
                    "items": { "type": "object" }
                }
            },
            "required": ["name", "pieces"]
        })
    }

    fn read_only(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'name'".to_string()))?;
        let pieces: Vec<PlanPiece> = serde_json::from_value(
            args.get("pieces")
                .cloned()
                .ok_or_else(|| Error::InvalidArguments("missing required argument 'pieces'".to_string()))?,
        )
        .map_err(|e| Error::InvalidArguments(format!("invalid 'pieces': {}", e)))?;

        plan_payload(self.plans.analyze_decompose(name, pieces).await?)
    }
}

pub struct MergeFunctions {
    plans: Arc<PlanEngine>,
}

impl MergeFunctions {
    pub fn new(plans: Arc<PlanEngine>) -> Self {
        Self { plans }
    }
}

#[async_trait::async_trait]
impl Capability for MergeFunctions {
    fn name(&self) -> &str {
        "function.merge"
    }

    fn description(&self) -> &str {
        "Analyze merging several functions into one. Returns a plan; \
         nothing changes until plan.confirm is called with its id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "names": {
                    "type": "array",
                    "description": "Source functions to merge",
                    "items": { "type": "string" }
                },
                "into": { "type": "string", "description": "Name of the merged function" },
                "code": { "type": "string", "description": "Merged code; defaults to concatenation" }
            },
            "required": ["names", "into"]
        })
    }

    fn read_only(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let names: Vec<String> = serde_json::from_value(
            args.get("names")
                .cloned()
                .ok_or_else(|| Error::InvalidArguments("missing required argument 'names'".to_string()))?,
        )
        .map_err(|e| Error::InvalidArguments(format!("invalid 'names': {}", e)))?;
        let into = args
            .get("into")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'into'".to_string()))?
            .to_string();
        let code = args
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string);

        plan_payload(self.plans.analyze_merge(names, into, code).await?)
    }
}

pub struct ConfirmPlan {
    plans: Arc<PlanEngine>,
}

impl ConfirmPlan {
    pub fn new(plans: Arc<PlanEngine>) -> Self {
        Self { plans }
    }
}

#[async_trait::async_trait]
impl Capability for ConfirmPlan {
    fn name(&self) -> &str {
        "plan.confirm"
    }

    fn description(&self) -> &str {
        "Apply a previously analyzed plan. Fails if the plan expired or its \
         target functions changed since analysis."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "plan_id": { "type": "string", "description": "Plan to apply" }
            },
            "required": ["plan_id"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        args.get("plan_id")
            .and_then(Value::as_str)
            .map(|id| vec![format!("plan:{}", id)])
            .unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let plan_id = args
            .get("plan_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'plan_id'".to_string()))?;
        let report = self.plans.confirm(plan_id).await?;
        Ok(serde_json::to_value(report)?)
    }
}
