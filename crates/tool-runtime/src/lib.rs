pub mod registry;
pub mod tool;

pub use registry::{RegistryError, ToolRegistry};
pub use tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResponse};
