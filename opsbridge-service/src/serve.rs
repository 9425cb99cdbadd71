//! Line-oriented JSON dispatch over stdin/stdout
//!
//! Each input line is `{"id": .., "tool": "..", "arguments": {..}}` and is
//! answered by exactly one output line carrying the same `id`. A few
//! reserved tool names operate on the tool table itself.

use anyhow::Result;
use opsbridge_core::paginate;
use opsbridge_services::ServiceManager;
use opsbridge_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

const LIST_TOOLS: &str = "tools/list";
const DISABLE_TOOL: &str = "tools/disable";
const ENABLE_TOOL: &str = "tools/enable";
const LIST_DISABLED: &str = "tools/disabled";
const TOOL_STATS: &str = "tools/stats";
const SERVICE_STATUS: &str = "services/status";

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, error: impl ToString) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Answers requests against a manager and its installed tool table
pub struct Dispatcher<'a> {
    manager: &'a ServiceManager,
    table: &'a ToolRegistry,
    page_size: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(manager: &'a ServiceManager, table: &'a ToolRegistry, page_size: usize) -> Self {
        Self {
            manager,
            table,
            page_size,
        }
    }

    /// Serve until the reader reaches end of input
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Serving tool requests on stdio");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Request>(line) {
                Ok(request) => self.handle(request).await,
                Err(e) => {
                    error!(error = %e, "Malformed request");
                    Response::err(Value::Null, format!("malformed request: {}", e))
                }
            };

            let encoded = serde_json::to_string(&response)?;
            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("Input closed, leaving dispatch loop");
        Ok(())
    }

    async fn handle(&self, request: Request) -> Response {
        debug!(id = %request.id, tool = %request.tool, "Dispatching");
        let Request {
            id,
            tool,
            arguments,
        } = request;

        match tool.as_str() {
            LIST_TOOLS => self.list_tools(id, &arguments).await,
            DISABLE_TOOL | ENABLE_TOOL => {
                let Some(name) = arguments.get("name").and_then(Value::as_str) else {
                    return Response::err(id, "missing required argument 'name'");
                };
                let changed = if tool == DISABLE_TOOL {
                    self.manager.disable_operation(name).await
                } else {
                    self.manager.enable_operation(name).await
                };
                let summary = self.manager.register_capabilities(self.table).await;
                Response::ok(id, json!({ "changed": changed, "registered": summary.registered }))
            }
            LIST_DISABLED => Response::ok(id, json!(self.manager.list_disabled_operations().await)),
            TOOL_STATS => match serde_json::to_value(self.table.stats().await) {
                Ok(stats) => Response::ok(id, stats),
                Err(e) => Response::err(id, e),
            },
            SERVICE_STATUS => match serde_json::to_value(self.manager.status_report().await) {
                Ok(report) => Response::ok(id, report),
                Err(e) => Response::err(id, e),
            },
            _ => match self.table.call(&tool, arguments).await {
                Ok(result) => Response::ok(id, result),
                Err(e) => Response::err(id, e),
            },
        }
    }

    async fn list_tools(&self, id: Value, arguments: &Value) -> Response {
        let cursor = arguments.get("cursor").and_then(Value::as_str);
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(self.page_size);

        let page = paginate(self.table.list().await, cursor, limit);
        match serde_json::to_value(page) {
            Ok(page) => Response::ok(id, page),
            Err(e) => Response::err(id, e),
        }
    }
}
