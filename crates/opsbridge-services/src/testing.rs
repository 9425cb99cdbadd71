//! Scriptable service for exercising the manager without real backends

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use opsbridge_core::AppConfig;
use opsbridge_tools::{BoxedHandler, FnHandler, ToolDefinition};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::service::{Closeable, Service};

/// A service whose initialization and shutdown outcome is set up front.
///
/// Call counters are shared `Arc`s so a test can keep observing them after
/// the service has been moved into a manager.
pub struct StubService {
    name: String,
    tools: Vec<String>,
    missing_executors: HashSet<String>,
    extra_executors: Vec<String>,
    init_error: Option<String>,
    init_panics: bool,
    init_delay: Option<Duration>,
    closeable: bool,
    close_error: Option<String>,
    enabled: AtomicBool,
    init_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

impl StubService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: vec![],
            missing_executors: HashSet::new(),
            extra_executors: vec![],
            init_error: None,
            init_panics: false,
            init_delay: None,
            closeable: false,
            close_error: None,
            enabled: AtomicBool::new(false),
            init_calls: Arc::new(AtomicUsize::new(0)),
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Advertise these tools, each with a matching echo handler
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools.extend(tools.iter().map(|t| t.to_string()));
        self
    }

    /// Advertise `tool` but leave it out of the executor map
    pub fn without_executor(mut self, tool: &str) -> Self {
        self.missing_executors.insert(tool.to_string());
        self
    }

    /// Provide a handler that no capability advertises
    pub fn with_unadvertised_executor(mut self, tool: &str) -> Self {
        self.extra_executors.push(tool.to_string());
        self
    }

    /// Make `initialize` return this error
    pub fn failing(mut self, message: &str) -> Self {
        self.init_error = Some(message.to_string());
        self
    }

    /// Make `initialize` panic
    pub fn panicking(mut self) -> Self {
        self.init_panics = true;
        self
    }

    /// Sleep inside `initialize` before finishing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    /// Expose a close hook that succeeds
    pub fn closeable(mut self) -> Self {
        self.closeable = true;
        self
    }

    /// Expose a close hook that fails with this message
    pub fn failing_close(mut self, message: &str) -> Self {
        self.closeable = true;
        self.close_error = Some(message.to_string());
        self
    }

    /// Shared handle on the number of `initialize` calls
    pub fn init_counter(&self) -> Arc<AtomicUsize> {
        self.init_calls.clone()
    }

    /// Shared handle on the number of `close` calls
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.close_calls.clone()
    }

    fn echo(tool: &str) -> BoxedHandler {
        let tool = tool.to_string();
        FnHandler::boxed(move |args| Ok(json!({ "tool": tool, "arguments": args })))
    }
}

#[async_trait]
impl Service for StubService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _config: &AppConfig) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if self.init_panics {
            panic!("{} blew up during initialization", self.name);
        }
        if let Some(message) = &self.init_error {
            return Err(anyhow!("{}", message));
        }

        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> Vec<ToolDefinition> {
        if !self.is_enabled() {
            return vec![];
        }
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(&self.name, t, "stub tool", json!({"type": "object"})))
            .collect()
    }

    fn executors(&self) -> HashMap<String, BoxedHandler> {
        if !self.is_enabled() {
            return HashMap::new();
        }
        self.tools
            .iter()
            .filter(|t| !self.missing_executors.contains(*t))
            .chain(self.extra_executors.iter())
            .map(|t| (t.clone(), Self::echo(t)))
            .collect()
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        if self.closeable {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Closeable for StubService {
    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}
