//! Git sync capabilities — preview and apply pull/push

use crate::registry::{Capability, CapabilityClass};
use fnforge_core::{Error, Result};
use fnforge_sync::{Resolution, SyncEngine};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn names_arg(args: &Value) -> Result<Vec<String>> {
    let raw = args
        .get("names")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidArguments("missing required argument 'names'".to_string()))?;
    let mut names = Vec::with_capacity(raw.len());
    for value in raw {
        let name = value.as_str().ok_or_else(|| {
            Error::InvalidArguments("'names' entries must be strings".to_string())
        })?;
        names.push(name.to_string());
    }
    Ok(names)
}

/// Parse `{"name": "local" | "remote"}` resolution maps. Anything else for a
/// value is rejected before the engine runs.
fn resolutions_arg(args: &Value) -> Result<HashMap<String, Resolution>> {
    let mut resolutions = HashMap::new();
    let Some(raw) = args.get("resolutions") else {
        return Ok(resolutions);
    };
    let map = raw.as_object().ok_or_else(|| {
        Error::InvalidArguments("'resolutions' must be an object".to_string())
    })?;
    for (name, choice) in map {
        let resolution = match choice.as_str() {
            Some("local") => Resolution::Local,
            Some("remote") => Resolution::Remote,
            _ => {
                return Err(Error::InvalidArguments(format!(
                    "resolution for '{}' must be \"local\" or \"remote\"",
                    name
                )))
            }
        };
        resolutions.insert(name.clone(), resolution);
    }
    Ok(resolutions)
}

fn function_targets(args: &Value) -> Vec<String> {
    args.get("names")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(|name| format!("function:{}", name))
                .collect()
        })
        .unwrap_or_default()
}

fn preview_payload(preview: fnforge_sync::SyncPreview) -> Result<Value> {
    Ok(serde_json::to_value(preview)?)
}

fn report_payload(report: fnforge_sync::SyncReport) -> Result<Value> {
    Ok(serde_json::to_value(report)?)
}

pub struct PreviewPull {
    sync: Arc<SyncEngine>,
}

impl PreviewPull {
    pub fn new(sync: Arc<SyncEngine>) -> Self {
        Self { sync }
    }
}

#[async_trait::async_trait]
impl Capability for PreviewPull {
    fn name(&self) -> &str {
        "git.preview_pull"
    }

    fn description(&self) -> &str {
        "Preview which functions a pull would add, modify, delete, or conflict on."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Git
    }

    fn read_only(&self) -> bool {
        true
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        preview_payload(self.sync.preview_pull().await?)
    }
}

pub struct Pull {
    sync: Arc<SyncEngine>,
}

impl Pull {
    pub fn new(sync: Arc<SyncEngine>) -> Self {
        Self { sync }
    }
}

#[async_trait::async_trait]
impl Capability for Pull {
    fn name(&self) -> &str {
        "git.pull"
    }

    fn description(&self) -> &str {
        "Apply the remote version of the chosen functions locally. \
         Conflicted names need a resolution of \"local\" or \"remote\"."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "names": {
                    "type": "array",
                    "description": "Function names to pull",
                    "items": { "type": "string" }
                },
                "resolutions": {
                    "type": "object",
                    "description": "Per-name conflict choices: \"local\" or \"remote\""
                }
            },
            "required": ["names"]
        })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Git
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        function_targets(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let names = names_arg(&args)?;
        let resolutions = resolutions_arg(&args)?;
        report_payload(self.sync.selective_pull(&names, &resolutions).await?)
    }
}

pub struct PreviewPush {
    sync: Arc<SyncEngine>,
}

impl PreviewPush {
    pub fn new(sync: Arc<SyncEngine>) -> Self {
        Self { sync }
    }
}

#[async_trait::async_trait]
impl Capability for PreviewPush {
    fn name(&self) -> &str {
        "git.preview_push"
    }

    fn description(&self) -> &str {
        "Preview which functions a push would add, modify, delete, or conflict on."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Git
    }

    fn read_only(&self) -> bool {
        true
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        preview_payload(self.sync.preview_push().await?)
    }
}

pub struct Push {
    sync: Arc<SyncEngine>,
}

impl Push {
    pub fn new(sync: Arc<SyncEngine>) -> Self {
        Self { sync }
    }
}

#[async_trait::async_trait]
impl Capability for Push {
    fn name(&self) -> &str {
        "git.push"
    }

    fn description(&self) -> &str {
        "Commit the chosen local functions to the remote repository in a \
         single commit. Destructive: requires confirm: true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "names": {
                    "type": "array",
                    "description": "Function names to push",
                    "items": { "type": "string" }
                },
                "resolutions": {
                    "type": "object",
                    "description": "Per-name conflict choices: \"local\" or \"remote\""
                },
                "confirm": { "type": "boolean", "description": "Must be true" }
            },
            "required": ["names"]
        })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Git
    }

    fn idempotent(&self) -> bool {
        true
    }

    fn destructive(&self) -> bool {
        true
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        function_targets(args)
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let names = names_arg(&args)?;
        let resolutions = resolutions_arg(&args)?;
        report_payload(self.sync.selective_push(&names, &resolutions).await?)
    }
}
