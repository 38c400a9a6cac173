use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;

/// The implementation behind a registered tool.
///
/// `call` may perform network I/O and fail; `fallback` must produce a
/// deterministic value of the tool's output shape so that `invoke` never
/// surfaces an execution failure to the caller.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Value) -> anyhow::Result<Value>;

    fn fallback(&self, params: &Value) -> Value;
}

/// A tool together with its output contract and implementation.
pub struct ToolDefinition {
    pub tool: Tool,
    /// JSON schema describing the result shape, satisfied by both the
    /// success and fallback paths.
    pub output_schema: Value,
    handler: Box<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(tool: Tool, output_schema: Value, handler: Box<dyn ToolHandler>) -> Self {
        Self {
            tool,
            output_schema,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn fallback(&self, params: &Value) -> Value {
        self.handler.fallback(params)
    }
}

/// Order-preserving catalog of invocable tools. Built once at startup and
/// read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool definition, rejecting duplicate names.
    pub fn register(&mut self, definition: ToolDefinition) -> ToolResult<()> {
        if self.lookup(definition.name()).is_some() {
            return Err(ToolError::DuplicateName(definition.name().to_string()));
        }
        self.tools.push(definition);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|def| def.name() == name)
    }

    /// All definitions in registration order, for advertising to the agent.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Validate the input, run the tool, and shield the caller from
    /// execution failures by substituting the tool's fallback value.
    ///
    /// Errors are returned only for an unknown tool name or input that does
    /// not match the tool's schema. No retries are attempted here.
    pub async fn invoke(&self, name: &str, raw_input: Value) -> ToolResult<Value> {
        let definition = self
            .lookup(name)
            .ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;

        if let Err(issues) = validate_value(&definition.tool.input_schema, &raw_input) {
            return Err(ToolError::InvalidInput {
                tool: name.to_string(),
                issues,
            });
        }

        match definition.handler.call(raw_input.clone()).await {
            Ok(value) => Ok(value),
            Err(_) => Ok(definition.handler.fallback(&raw_input)),
        }
    }
}

/// Validate a value against a JSON schema, returning the offending fields.
pub fn validate_value(schema: &Value, instance: &Value) -> Result<(), Vec<String>> {
    let compiled = match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(err) => return Err(vec![format!("schema error: {err}")]),
    };

    let result = compiled.validate(instance);
    if let Err(errors) = result {
        let issues: Vec<String> = errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect();
        return Err(issues);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, params: Value) -> anyhow::Result<Value> {
            Ok(json!({ "message": params["message"] }))
        }

        fn fallback(&self, _params: &Value) -> Value {
            json!({ "message": "" })
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        async fn call(&self, _params: Value) -> anyhow::Result<Value> {
            anyhow::bail!("upstream unavailable")
        }

        fn fallback(&self, _params: &Value) -> Value {
            json!({ "message": "degraded" })
        }
    }

    fn echo_definition(name: &str, handler: Box<dyn ToolHandler>) -> ToolDefinition {
        ToolDefinition::new(
            Tool::new(
                name,
                "Echoes back the input",
                json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"]
                }),
            ),
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }),
            handler,
        )
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_definition("echo", Box::new(EchoTool)))
            .unwrap();

        let err = registry
            .register(echo_definition("echo", Box::new(EchoTool)))
            .unwrap_err();
        assert_eq!(err, ToolError::DuplicateName("echo".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("missing", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::ToolNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_validates_input() {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_definition("echo", Box::new(EchoTool)))
            .unwrap();

        let err = registry
            .invoke("echo", json!({ "message": 42 }))
            .await
            .unwrap_err();
        match err {
            ToolError::InvalidInput { tool, issues } => {
                assert_eq!(tool, "echo");
                assert!(issues.iter().any(|issue| issue.contains("message")));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_missing_required_field() {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_definition("echo", Box::new(EchoTool)))
            .unwrap();

        let err = registry.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_invoke_substitutes_fallback_on_failure() {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_definition("echo", Box::new(FailingTool)))
            .unwrap();

        let result = registry
            .invoke("echo", json!({ "message": "hi" }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "message": "degraded" }));

        let definition = registry.lookup("echo").unwrap();
        assert!(validate_value(&definition.output_schema, &result).is_ok());
    }

    #[test]
    fn test_validate_value_reports_paths() {
        let schema = json!({
            "type": "object",
            "properties": { "confidence": { "type": "number" } },
            "required": ["confidence"]
        });
        let issues = validate_value(&schema, &json!({ "confidence": "high" })).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("confidence"));
    }
}
