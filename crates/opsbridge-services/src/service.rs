//! The contract every backend integration satisfies

use anyhow::Result;
use async_trait::async_trait;
use opsbridge_core::AppConfig;
use opsbridge_tools::{BoxedHandler, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// One backend integration exposed as a set of tools.
///
/// Services are constructed inert. `initialize` is called at most once per
/// process and is the only place a service acquires its client; until it
/// succeeds `is_enabled` is false and both tool accessors return nothing.
#[async_trait]
pub trait Service: Send + Sync {
    /// Stable name, unique across all registered services
    fn name(&self) -> &str;

    /// Build the underlying client from configuration
    async fn initialize(&self, config: &AppConfig) -> Result<()>;

    /// True once `initialize` produced a usable client
    fn is_enabled(&self) -> bool;

    /// Tools this service advertises; empty while disabled
    fn capabilities(&self) -> Vec<ToolDefinition>;

    /// Handlers keyed by tool name; empty while disabled
    fn executors(&self) -> HashMap<String, BoxedHandler>;

    /// Shutdown hook, for services holding resources worth releasing
    fn as_closeable(&self) -> Option<&dyn Closeable> {
        None
    }
}

/// Optional shutdown capability
#[async_trait]
pub trait Closeable: Send + Sync {
    async fn close(&self) -> Result<()>;
}

/// Type alias for shared services
pub type BoxedService = Arc<dyn Service>;

/// Builds a fresh, inert service instance
pub type ServiceFactory = Box<dyn Fn() -> BoxedService + Send + Sync>;
