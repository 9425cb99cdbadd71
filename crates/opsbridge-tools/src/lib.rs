//! opsbridge-tools: Tool definitions and dispatch
//!
//! Provides the capability descriptor types every service contributes and the
//! dispatch table the merged namespace is installed into.

pub mod registry;
pub mod tool;

// Re-export main types
pub use registry::{RegistryStats, ToolRegistry};
pub use tool::{BoxedHandler, FnHandler, ToolDefinition, ToolHandler};
