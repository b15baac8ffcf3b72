//! Object-store file capabilities — upload and delete blobs

use crate::registry::Capability;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};

fn key_arg(args: &Value) -> Result<&str> {
    args.get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'key'".to_string()))
}

pub struct UploadFile {
    ctx: ProjectContext,
}

impl UploadFile {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for UploadFile {
    fn name(&self) -> &str {
        "file.upload"
    }

    fn description(&self) -> &str {
        "Upload a file to project storage. Content is base64-encoded."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Storage key" },
                "content": { "type": "string", "description": "Base64-encoded bytes" },
                "content_type": { "type": "string", "description": "MIME type" }
            },
            "required": ["key", "content"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        args.get("key")
            .and_then(Value::as_str)
            .map(|key| vec![format!("object:{}", key)])
            .unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let key = key_arg(&args)?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'content'".to_string()))?;
        let content_type = args
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream");

        let bytes = BASE64
            .decode(content)
            .map_err(|e| Error::InvalidArguments(format!("content is not valid base64: {}", e)))?;
        let size = bytes.len();
        self.ctx.objects.put(key, bytes, content_type).await?;
        Ok(json!({ "key": key, "bytes": size, "content_type": content_type }))
    }
}

pub struct DeleteFile {
    ctx: ProjectContext,
}

impl DeleteFile {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for DeleteFile {
    fn name(&self) -> &str {
        "file.delete"
    }

    fn description(&self) -> &str {
        "Delete a stored file. Destructive: requires confirm: true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Storage key" },
                "confirm": { "type": "boolean", "description": "Must be true" }
            },
            "required": ["key"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn destructive(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        args.get("key")
            .and_then(Value::as_str)
            .map(|key| vec![format!("object:{}", key)])
            .unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let key = key_arg(&args)?;
        let deleted = self.ctx.objects.delete(key).await;
        Ok(json!({ "key": key, "deleted": deleted }))
    }
}
