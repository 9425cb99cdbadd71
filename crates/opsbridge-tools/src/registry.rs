//! Tool Registry: the merged capability namespace
//!
//! The service manager installs every registrable tool here in one step
//! (`replace_all`), so a registration pass either fully replaces the table or
//! leaves it alone. Dispatch reads take the shared lock only long enough to
//! clone the handler out.

use opsbridge_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::tool::{BoxedHandler, ToolDefinition};

/// A registered tool
#[derive(Clone)]
struct RegisteredTool {
    handler: BoxedHandler,
    definition: ToolDefinition,
}

/// Statistics about the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    pub registered: usize,
    pub total_calls: u64,
    pub failed_calls: u64,
    pub replacements: u64,
}

/// Dispatch table keyed by tool name
pub struct ToolRegistry {
    tools: RwLock<HashMap<Arc<str>, RegisteredTool>>,
    total_calls: AtomicU64,
    failed_calls: AtomicU64,
    replacements: AtomicU64,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            total_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            replacements: AtomicU64::new(0),
        }
    }

    /// Register a single tool; names must be unique
    pub async fn register(&self, definition: ToolDefinition, handler: BoxedHandler) -> Result<()> {
        let mut tools = self.tools.write().await;
        let name: Arc<str> = Arc::from(definition.name.as_str());

        if let Some(existing) = tools.get(&name) {
            return Err(Error::invalid_argument(format!(
                "tool '{}' already registered by service '{}'",
                name, existing.definition.service
            )));
        }

        tools.insert(name.clone(), RegisteredTool { handler, definition });
        debug!("Registered tool: {}", name);
        Ok(())
    }

    /// Atomically swap the whole table for a new set of tools.
    ///
    /// Later entries with an already-seen name are dropped; callers are
    /// expected to deduplicate before getting here.
    pub async fn replace_all(&self, entries: Vec<(ToolDefinition, BoxedHandler)>) -> usize {
        let mut next = HashMap::with_capacity(entries.len());
        for (definition, handler) in entries {
            let name: Arc<str> = Arc::from(definition.name.as_str());
            if next.contains_key(&name) {
                warn!("Dropping duplicate tool '{}' during table swap", name);
                continue;
            }
            next.insert(name, RegisteredTool { handler, definition });
        }

        let count = next.len();
        *self.tools.write().await = next;
        self.replacements.fetch_add(1, Ordering::Relaxed);
        info!("Dispatch table now holds {} tools", count);
        count
    }

    /// Get a tool handler by name
    pub async fn get(&self, name: &str) -> Option<BoxedHandler> {
        let tools = self.tools.read().await;
        tools.get(name).map(|t| t.handler.clone())
    }

    /// Get tool definition by name
    pub async fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        let tools = self.tools.read().await;
        tools.get(name).map(|t| t.definition.clone())
    }

    /// List all tool definitions, sorted by name
    pub async fn list(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut definitions: Vec<ToolDefinition> =
            tools.values().map(|t| t.definition.clone()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Sorted tool names
    pub async fn names(&self) -> Vec<String> {
        self.list().await.into_iter().map(|d| d.name).collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// Dispatch a call to the named tool
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value> {
        let handler = self
            .get(name)
            .await
            .ok_or_else(|| Error::not_found(format!("tool '{}'", name)))?;

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        match handler.call(arguments).await {
            Ok(value) => {
                debug!(tool = name, elapsed_ms = start.elapsed().as_millis() as u64, "Tool call succeeded");
                Ok(value)
            }
            Err(e) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                warn!(tool = name, "Tool call failed: {:#}", e);
                Err(Error::backend(format!("{}: {:#}", name, e)))
            }
        }
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.len().await,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
