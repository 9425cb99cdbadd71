//! Capability descriptors and handlers
//!
//! A service contributes two things: a list of [`ToolDefinition`]s it
//! advertises and a map from tool name to [`BoxedHandler`] that implements
//! each one. The two are kept apart so a mismatch can be detected before
//! anything is dispatched.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Tool definition metadata (without the implementation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Name of the service that owns this tool
    pub service: String,
}

impl ToolDefinition {
    pub fn new(service: &str, name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            service: service.to_string(),
        }
    }
}

/// Executes one tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with already-parsed arguments
    async fn call(&self, arguments: Value) -> Result<Value>;
}

/// Type alias for shared handlers
pub type BoxedHandler = Arc<dyn ToolHandler>;

/// Handler backed by a plain closure
#[derive(Clone)]
pub struct FnHandler {
    handler: Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>,
}

impl FnHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Wrap a closure straight into a [`BoxedHandler`]
    pub fn boxed<F>(handler: F) -> BoxedHandler
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Self::new(handler))
    }
}

#[async_trait]
impl ToolHandler for FnHandler {
    async fn call(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments)
    }
}
