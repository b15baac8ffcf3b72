//! Database capabilities — schema inspection, schema migration, queries

use crate::registry::{Capability, CapabilityClass};
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};
use tracing::debug;

pub struct GetSchema {
    ctx: ProjectContext,
}

impl GetSchema {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for GetSchema {
    fn name(&self) -> &str {
        "db.get_schema"
    }

    fn description(&self) -> &str {
        "Read the project database schema."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Database
    }

    fn read_only(&self) -> bool {
        true
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        let schema = self.ctx.project.schema().await;
        Ok(json!({ "schema": schema }))
    }
}

pub struct UpdateSchema {
    ctx: ProjectContext,
}

impl UpdateSchema {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for UpdateSchema {
    fn name(&self) -> &str {
        "db.update_schema"
    }

    fn description(&self) -> &str {
        "Replace the project database schema with the given definition."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "schema": { "type": "object", "description": "Full schema definition" }
            },
            "required": ["schema"]
        })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Database
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, _args: &Value) -> Vec<String> {
        vec!["db:schema".to_string()]
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let schema = args
            .get("schema")
            .cloned()
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'schema'".to_string()))?;
        if !schema.is_object() {
            return Err(Error::InvalidArguments(
                "'schema' must be an object".to_string(),
            ));
        }
        self.ctx.project.set_schema(schema).await;
        debug!("database schema replaced");
        Ok(json!({ "updated": true }))
    }
}

pub struct RunQuery {
    ctx: ProjectContext,
}

impl RunQuery {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for RunQuery {
    fn name(&self) -> &str {
        "db.query"
    }

    fn description(&self) -> &str {
        "Execute a SQL statement against the project database."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": { "type": "string", "description": "Statement to execute" }
            },
            "required": ["sql"]
        })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Database
    }

    fn target_keys(&self, _args: &Value) -> Vec<String> {
        // Statements can touch any table; serialize against migrations too.
        vec!["db:schema".to_string()]
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let sql = args
            .get("sql")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'sql'".to_string()))?;
        self.ctx.sql.execute(sql).await
    }
}
