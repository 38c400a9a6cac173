pub mod components;
pub mod tools;

pub use components::{ComponentDefinition, ComponentRegistry};
pub use tools::{ToolDefinition, ToolHandler, ToolRegistry};
