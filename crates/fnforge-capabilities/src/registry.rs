//! Capability trait and registry
//!
//! Each capability is a self-contained module implementing the Capability
//! trait. The registry is built once at startup and never mutated at
//! runtime, which keeps the invocable surface auditable.

use fnforge_core::{Error, Result, ToolDefinition};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Timeout class. File edits are quick; database, test and git operations
/// get materially longer budgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityClass {
    Edit,
    Git,
    Database,
    Test,
}

/// A named, schema-validated operation the agent may invoke.
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    /// Unique capability name (e.g. "function.create").
    fn name(&self) -> &str;

    /// Human-readable description sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema for input arguments.
    fn input_schema(&self) -> Value;

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Edit
    }

    /// Safe to retry after a timeout or partial failure.
    fn idempotent(&self) -> bool {
        false
    }

    /// Requires an explicit `confirm: true` argument before dispatch.
    fn destructive(&self) -> bool {
        false
    }

    /// Whether this capability only reads project state.
    fn read_only(&self) -> bool {
        false
    }

    /// Entity keys this call mutates. Dispatch serializes handler bodies
    /// that share a key; independent keys may run concurrently.
    fn target_keys(&self, _args: &Value) -> Vec<String> {
        Vec::new()
    }

    /// Execute with already-validated arguments.
    async fn execute(&self, args: Value) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability. Registering a name twice is a startup bug.
    pub fn register(&mut self, capability: impl Capability + 'static) -> Result<()> {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            return Err(Error::DuplicateCapability(name));
        }
        self.capabilities.insert(name, Arc::new(capability));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Model tool definitions for the whole registry.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .capabilities
            .values()
            .map(|c| c.definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
