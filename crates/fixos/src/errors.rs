use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Tool {tool} is already associated with component {existing}")]
    AmbiguousAssociation { tool: String, existing: String },

    #[error("Invalid input for {tool}: {}", .issues.join("; "))]
    InvalidInput { tool: String, issues: Vec<String> },

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
