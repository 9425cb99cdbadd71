//! Local helper tools that need no backend

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use opsbridge_core::AppConfig;
use opsbridge_tools::{BoxedHandler, FnHandler, ToolDefinition, ToolHandler};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::service::Service;

pub const GET_TIME: &str = "utilities_get_time";
pub const SLEEP: &str = "utilities_sleep";

/// Longest sleep a caller may request
pub const MAX_SLEEP_SECS: f64 = 60.0;

pub struct UtilitiesService {
    enabled: AtomicBool,
}

impl UtilitiesService {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }
}

impl Default for UtilitiesService {
    fn default() -> Self {
        Self::new()
    }
}

struct SleepHandler;

#[async_trait]
impl ToolHandler for SleepHandler {
    async fn call(&self, arguments: Value) -> Result<Value> {
        let Some(seconds) = arguments.get("seconds").and_then(Value::as_f64) else {
            bail!("missing required argument 'seconds'");
        };
        if !(0.0..=MAX_SLEEP_SECS).contains(&seconds) {
            bail!("'seconds' must be between 0 and {}", MAX_SLEEP_SECS);
        }

        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        Ok(json!({ "slept_seconds": seconds }))
    }
}

fn current_time(_arguments: Value) -> Result<Value> {
    let now = Utc::now();
    Ok(json!({
        "utc": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        "unix": now.timestamp(),
    }))
}

#[async_trait]
impl Service for UtilitiesService {
    fn name(&self) -> &str {
        "utilities"
    }

    async fn initialize(&self, _config: &AppConfig) -> Result<()> {
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
        vec![
            ToolDefinition::new(
                self.name(),
                GET_TIME,
                "Current UTC time as RFC 3339 and unix seconds",
                json!({ "type": "object", "properties": {} }),
            ),
            ToolDefinition::new(
                self.name(),
                SLEEP,
                "Wait for a number of seconds before returning",
                json!({
                    "type": "object",
                    "properties": {
                        "seconds": { "type": "number", "minimum": 0, "maximum": MAX_SLEEP_SECS }
                    },
                    "required": ["seconds"]
                }),
            ),
        ]
    }

    fn executors(&self) -> HashMap<String, BoxedHandler> {
        if !self.is_enabled() {
            return HashMap::new();
        }
        let sleep: BoxedHandler = Arc::new(SleepHandler);
        HashMap::from([
            (GET_TIME.to_string(), FnHandler::boxed(current_time)),
            (SLEEP.to_string(), sleep),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tools_appear_after_initialize() {
        let service = UtilitiesService::new();
        assert!(service.executors().is_empty());

        service.initialize(&AppConfig::default()).await.unwrap();
        let names: Vec<String> = service.capabilities().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![GET_TIME, SLEEP]);
        assert_eq!(service.executors().len(), 2);
    }

    #[tokio::test]
    async fn test_get_time() {
        let out = current_time(Value::Null).unwrap();
        assert!(out["utc"].as_str().unwrap().ends_with('Z'));
        assert!(out["unix"].as_i64().unwrap() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_bounds() {
        let handler = SleepHandler;
        let out = handler.call(json!({"seconds": 1.5})).await.unwrap();
        assert_eq!(out["slept_seconds"], 1.5);

        assert!(handler.call(json!({"seconds": 600})).await.is_err());
        assert!(handler.call(json!({"seconds": -1})).await.is_err());
        assert!(handler.call(json!({})).await.is_err());
    }
}
