//! Environment-variable capabilities

use crate::registry::Capability;
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};

fn env_target(args: &Value) -> Vec<String> {
    args.get("name")
        .and_then(Value::as_str)
        .map(|name| vec![format!("env:{}", name)])
        .unwrap_or_default()
}

fn name_arg(args: &Value) -> Result<&str> {
    args.get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'name'".to_string()))
}

pub struct SetEnvVar {
    ctx: ProjectContext,
}

impl SetEnvVar {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for SetEnvVar {
    fn name(&self) -> &str {
        "env.set"
    }

    fn description(&self) -> &str {
        "Set an environment variable for the project's functions."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Variable name" },
                "value": { "type": "string", "description": "Variable value" }
            },
            "required": ["name", "value"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        env_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let value = args
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'value'".to_string()))?;
        self.ctx.project.set_env_var(name, value).await;
        Ok(json!({ "name": name }))
    }
}

pub struct UnsetEnvVar {
    ctx: ProjectContext,
}

impl UnsetEnvVar {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for UnsetEnvVar {
    fn name(&self) -> &str {
        "env.unset"
    }

    fn description(&self) -> &str {
        "Remove an environment variable."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Variable name" }
            },
            "required": ["name"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        env_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let removed = self.ctx.project.unset_env_var(name).await;
        Ok(json!({ "name": name, "removed": removed }))
    }
}

pub struct ListEnvVars {
    ctx: ProjectContext,
}

impl ListEnvVars {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for ListEnvVars {
    fn name(&self) -> &str {
        "env.list"
    }

    fn description(&self) -> &str {
        "List environment variable names. Values are not echoed back."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn read_only(&self) -> bool {
        true
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        let names: Vec<String> = self
            .ctx
            .project
            .env_vars()
            .await
            .into_iter()
            .map(|v| v.name)
            .collect();
        Ok(json!({ "names": names }))
    }
}
