//! Site-file capabilities

use crate::registry::Capability;
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};

fn site_target(args: &Value) -> Vec<String> {
    args.get("path")
        .and_then(Value::as_str)
        .map(|path| vec![format!("site:{}", path)])
        .unwrap_or_default()
}

fn path_arg(args: &Value) -> Result<&str> {
    args.get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'path'".to_string()))
}

pub struct WriteSiteFile {
    ctx: ProjectContext,
}

impl WriteSiteFile {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for WriteSiteFile {
    fn name(&self) -> &str {
        "site.write"
    }

    fn description(&self) -> &str {
        "Create or overwrite a site file at the given path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Site-relative path" },
                "content": { "type": "string", "description": "File content" }
            },
            "required": ["path", "content"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        site_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = path_arg(&args)?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'content'".to_string()))?;
        let file = self.ctx.project.upsert_site_file(path, content).await;
        Ok(json!({ "path": file.path, "updated_at": file.updated_at }))
    }
}

pub struct DeleteSiteFile {
    ctx: ProjectContext,
}

impl DeleteSiteFile {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for DeleteSiteFile {
    fn name(&self) -> &str {
        "site.delete"
    }

    fn description(&self) -> &str {
        "Delete a site file. Destructive: requires confirm: true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Site-relative path" },
                "confirm": { "type": "boolean", "description": "Must be true" }
            },
            "required": ["path"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn destructive(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        site_target(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let path = path_arg(&args)?;
        let deleted = self.ctx.project.delete_site_file(path).await;
        Ok(json!({ "path": path, "deleted": deleted }))
    }
}
