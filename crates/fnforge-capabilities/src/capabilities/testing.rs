//! Test-run capability — execute a function against a sample input

use crate::registry::{Capability, CapabilityClass};
use fnforge_core::{Error, ProjectContext, Result};
use serde_json::{json, Value};
use tracing::debug;

pub struct RunTest {
    ctx: ProjectContext,
}

impl RunTest {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Capability for RunTest {
    fn name(&self) -> &str {
        "test.run"
    }

    fn description(&self) -> &str {
        "Run a function against a sample input and return its output. \
         Compile errors are reported with the compiler's diagnostics."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Function to run" },
                "input": { "type": "object", "description": "Sample request payload" }
            },
            "required": ["name"]
        })
    }

    fn class(&self) -> CapabilityClass {
        CapabilityClass::Test
    }

    fn target_keys(&self, args: &Value) -> Vec<String> {
        args.get("name")
            .and_then(Value::as_str)
            .map(|name| vec![format!("function:{}", name)])
            .unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidArguments("missing required argument 'name'".to_string()))?;
        let input = args.get("input").cloned().unwrap_or_else(|| json!({}));

        let record = self
            .ctx
            .project
            .get_function(name)
            .await
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;

        debug!(name, "test run");
        let output = self.ctx.compiler.run(&record.code, &input).await?;
        Ok(json!({ "name": name, "output": output }))
    }
}
