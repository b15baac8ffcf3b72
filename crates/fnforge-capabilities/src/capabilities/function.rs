//! Function capabilities — create, update, delete, read

use crate::registry::Capability;
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};
use tracing::debug;

fn function_target(args: &Value) -> Vec<String> {
    args.get("name")
        .and_then(Value::as_str)
        .map(|name| vec![format!("function:{}", name)])
        .unwrap_or_default()
}

fn name_arg(args: &Value) -> Result<&str> {
    args.get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'name'".to_string()))
}

fn code_arg(args: &Value) -> Result<&str> {
    args.get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'code'".to_string()))
}

pub struct CreateFunction {
    ctx: ProjectContext,
}

impl CreateFunction {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for CreateFunction {
    fn name(&self) -> &str {
        "function.create"
    }

    fn description(&self) -> &str {
        "Create a server-side function with the given code. Overwrites an \
         existing function of the same name, so retrying is safe."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Function name" },
                "code": { "type": "string", "description": "Function source code" }
            },
            "required": ["name", "code"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        function_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let code = code_arg(&args)?;
        let record = self.ctx.project.upsert_function(name, code).await;
        debug!(name, bytes = code.len(), "function created");
        Ok(json!({ "name": record.name, "updated_at": record.updated_at }))
    }
}

pub struct UpdateFunction {
    ctx: ProjectContext,
}

impl UpdateFunction {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for UpdateFunction {
    fn name(&self) -> &str {
        "function.update"
    }

    fn description(&self) -> &str {
        "Replace the code of an existing function. Fails if the function \
         does not exist; use function.create for new functions."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Function name" },
                "code": { "type": "string", "description": "New source code" }
            },
            "required": ["name", "code"]
        })
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        function_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let code = code_arg(&args)?;
        if self.ctx.project.get_function(name).await.is_none() {
            return Err(Error::FunctionNotFound(name.to_string()));
        }
        let record = self.ctx.project.upsert_function(name, code).await;
        Ok(json!({ "name": record.name, "updated_at": record.updated_at }))
    }
}

pub struct DeleteFunction {
    ctx: ProjectContext,
}

impl DeleteFunction {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for DeleteFunction {
    fn name(&self) -> &str {
        "function.delete"
    }

    fn description(&self) -> &str {
        "Delete a function permanently. Destructive: requires confirm: true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Function name" },
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

    fn target_keys(&self, args: &Value) -> Vec<String> {
        function_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let deleted = self.ctx.project.delete_function(name).await;
        debug!(name, deleted, "function delete");
        Ok(json!({ "name": name, "deleted": deleted }))
    }
}

pub struct GetFunction {
    ctx: ProjectContext,
}

impl GetFunction {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for GetFunction {
    fn name(&self) -> &str {
        "function.get"
    }

    fn description(&self) -> &str {
        "Read a function's current code and metadata."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Function name" }
            },
            "required": ["name"]
        })
    }

    fn read_only(&self) -> bool {
        true
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = name_arg(&args)?;
        let record = self
            .ctx
            .project
            .get_function(name)
            .await
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
        Ok(json!({
            "name": record.name,
            "code": record.code,
            "updated_at": record.updated_at
        }))
    }
}

pub struct ListFunctions {
    ctx: ProjectContext,
}

impl ListFunctions {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for ListFunctions {
    fn name(&self) -> &str {
        "function.list"
    }

    fn description(&self) -> &str {
        "List the project's functions with their last-updated timestamps."
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
        let functions = self.ctx.project.list_functions().await;
        let items: Vec<Value> = functions
            .iter()
            .map(|f| json!({ "name": f.name, "updated_at": f.updated_at }))
            .collect();
        Ok(json!({ "functions": items }))
    }
}
