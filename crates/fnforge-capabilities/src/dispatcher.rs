//! Tool dispatcher
//!
//! Resolves a model-issued tool call to a registered capability, validates
//! the untrusted arguments against its schema, serializes per target key,
//! enforces the per-class deadline, and normalizes every outcome into a
//! ToolResult the model can consume. A dispatch never returns a process
//! level error.

use crate::registry::{CapabilityClass, CapabilityRegistry};
use fnforge_core::{FailureKind, TargetLocks, ToolCall, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub edit_timeout: Duration,
    pub git_timeout: Duration,
    pub database_timeout: Duration,
    pub test_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            edit_timeout: Duration::from_secs(10),
            git_timeout: Duration::from_secs(30),
            database_timeout: Duration::from_secs(60),
            test_timeout: Duration::from_secs(120),
        }
    }
}

impl DispatcherConfig {
    fn timeout_for(&self, class: CapabilityClass) -> Duration {
        match class {
            CapabilityClass::Edit => self.edit_timeout,
            CapabilityClass::Git => self.git_timeout,
            CapabilityClass::Database => self.database_timeout,
            CapabilityClass::Test => self.test_timeout,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    config: DispatcherConfig,
    locks: Arc<TargetLocks>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>, config: DispatcherConfig) -> Self {
        Self {
            registry,
            config,
            locks: Arc::new(TargetLocks::new()),
        }
    }

    /// Share a lock table with other mutation paths. The plan engine's
    /// apply phase must lock through the same table as the dispatcher, or
    /// a confirm could race a direct edit of the same function.
    pub fn with_target_locks(mut self, locks: Arc<TargetLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn target_locks(&self) -> &Arc<TargetLocks> {
        &self.locks
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        let Some(capability) = self.registry.lookup(&call.name) else {
            return ToolResult::failure(
                call.id,
                FailureKind::UnknownCapability,
                format!("no capability named '{}'", call.name),
            );
        };

        if let Err(diagnostic) = validate_arguments(&capability.input_schema(), &call.arguments) {
            debug!(capability = %call.name, %diagnostic, "arguments rejected");
            return ToolResult::failure(call.id, FailureKind::InvalidArguments, diagnostic);
        }

        if capability.destructive() && !confirmed(&call.arguments) {
            return ToolResult::failure(
                call.id,
                FailureKind::ConfirmationRequired,
                format!("'{}' is destructive; pass confirm: true", call.name),
            );
        }

        // Per-target serialization.
        let keys = capability.target_keys(&call.arguments);
        let guards = self.locks.acquire(&keys).await;

        let deadline = self.config.timeout_for(capability.class());
        let outcome = tokio::time::timeout(deadline, capability.execute(call.arguments.clone())).await;
        drop(guards);

        match outcome {
            Err(_) => {
                warn!(capability = %call.name, ?deadline, "capability timed out");
                ToolResult::failure(
                    call.id,
                    FailureKind::Timeout,
                    format!("deadline of {:?} exceeded", deadline),
                )
            }
            Ok(Ok(payload)) => ToolResult::success(call.id, payload),
            Ok(Err(e)) => {
                let kind = e.failure_kind();
                if kind == FailureKind::HandlerError {
                    warn!(capability = %call.name, error = %e, "handler failed");
                }
                ToolResult::failure(call.id, kind, e.to_string())
            }
        }
    }
}

fn confirmed(args: &Value) -> bool {
    args.get("confirm").and_then(Value::as_bool).unwrap_or(false)
}

/// Minimal JSON-Schema check: object shape, required keys, primitive types
/// and enum membership. Unknown keys pass through so the model may include
/// extra context without tripping validation.
pub fn validate_arguments(schema: &Value, args: &Value) -> std::result::Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(format!("missing required argument '{}'", key));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in object {
            let Some(property) = properties.get(key) else {
                continue;
            };
            if let Some(expected) = property.get("type").and_then(Value::as_str) {
                if !type_matches(expected, value) {
                    return Err(format!("argument '{}' must be of type {}", key, expected));
                }
            }
            if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
                if !allowed.contains(value) {
                    return Err(format!(
                        "argument '{}' must be one of {}",
                        key,
                        Value::Array(allowed.clone())
                    ));
                }
            }
        }
    }
    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}
