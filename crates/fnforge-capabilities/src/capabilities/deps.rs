//! Dependency capabilities
//!
//! The dependency manifest is one shared document, so every mutation
//! serializes on the same "deps" target key.

use crate::registry::Capability;
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};

const DEPS_TARGET: &str = "deps";

fn name_arg(args: &Value) -> Result<&str> {
    args.get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'name'".to_string()))
}

pub struct AddDependency {
    ctx: ProjectContext,
}

impl AddDependency {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for AddDependency {
    fn name(&self) -> &str {
        "deps.add"
    }

    fn description(&self) -> &str {
        "Add or pin a package dependency at the given version."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Package name" },
                "version": { "type": "string", "description": "Version requirement" }
            },
            "required": ["name", "version"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, _args: &Value) -> Vec<String> {
        vec![DEPS_TARGET.to_string()]
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let version = args
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'version'".to_string()))?;
        self.ctx.project.add_dependency(name, version).await;
        Ok(json!({ "name": name, "version": version }))
    }
}

pub struct RemoveDependency {
    ctx: ProjectContext,
}

impl RemoveDependency {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for RemoveDependency {
    fn name(&self) -> &str {
        "deps.remove"
    }

    fn description(&self) -> &str {
        "Remove a package dependency. Destructive: requires confirm: true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Package name" },
                "confirm": { "type": "boolean", "description": "Must be true" }
            },
            "required": ["name"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn destructive(&self) -> bool {
        true
    }

    fn target_keys(&self, _args: &Value) -> Vec<String> {
        vec![DEPS_TARGET.to_string()]
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let removed = self.ctx.project.remove_dependency(name).await;
        Ok(json!({ "name": name, "removed": removed }))
    }
}

pub struct ListDependencies {
    ctx: ProjectContext,
}

impl ListDependencies {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for ListDependencies {
    fn name(&self) -> &str {
        "deps.list"
    }

    fn description(&self) -> &str {
        "List the project's package dependencies."
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
        let deps = self.ctx.project.dependencies().await;
        Ok(json!({ "dependencies": deps }))
    }
}
