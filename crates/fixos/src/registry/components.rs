use serde_json::Value;

use crate::errors::{ToolError, ToolResult};

/// A renderable UI unit with a typed prop contract, fed by zero or more
/// tools whose output shape matches `props_schema`.
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    pub name: String,
    pub props_schema: Value,
    pub associated_tools: Vec<String>,
}

impl ComponentDefinition {
    pub fn new<N: Into<String>>(
        name: N,
        props_schema: Value,
        associated_tools: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            props_schema,
            associated_tools,
        }
    }
}

/// Catalog of renderable components in registration order.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<ComponentDefinition>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component definition. Fails on a duplicate component name, and
    /// on a tool name already claimed by an earlier component so that
    /// tool-to-component resolution stays unambiguous.
    pub fn register(&mut self, definition: ComponentDefinition) -> ToolResult<()> {
        if self
            .components
            .iter()
            .any(|existing| existing.name == definition.name)
        {
            return Err(ToolError::DuplicateName(definition.name));
        }

        for tool in &definition.associated_tools {
            if let Some(existing) = self.find_by_tool_name(tool) {
                return Err(ToolError::AmbiguousAssociation {
                    tool: tool.clone(),
                    existing: existing.name.clone(),
                });
            }
        }

        self.components.push(definition);
        Ok(())
    }

    /// The first registered component associated with the given tool name.
    pub fn find_by_tool_name(&self, tool_name: &str) -> Option<&ComponentDefinition> {
        self.components
            .iter()
            .find(|def| def.associated_tools.iter().any(|tool| tool == tool_name))
    }

    pub fn definitions(&self) -> &[ComponentDefinition] {
        &self.components
    }
}
