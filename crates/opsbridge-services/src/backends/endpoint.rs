//! Table-driven HTTP services
//!
//! Each backend is described by a static list of [`EndpointSpec`]s. One
//! endpoint becomes one tool: `{placeholders}` in the path are filled from
//! arguments, declared query arguments are forwarded, and list endpoints are
//! paginated with the opaque cursor codec.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use opsbridge_core::pagination::paginate;
use opsbridge_core::AppConfig;
use opsbridge_tools::{BoxedHandler, ToolDefinition, ToolHandler};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::info;

use super::http::HttpBackend;
use crate::service::{Closeable, Service};

/// One GET endpoint exposed as a tool
#[derive(Debug, Clone, Copy)]
pub struct EndpointSpec {
    pub tool: &'static str,
    pub description: &'static str,
    pub path: &'static str,
    /// Optional arguments forwarded as query parameters
    pub query: &'static [&'static str],
    /// Query parameters always sent
    pub fixed_query: &'static [(&'static str, &'static str)],
    /// JSON pointer to the array to paginate; `""` is the document root
    pub list: Option<&'static str>,
}

impl EndpointSpec {
    pub const fn get(tool: &'static str, description: &'static str, path: &'static str) -> Self {
        Self {
            tool,
            description,
            path,
            query: &[],
            fixed_query: &[],
            list: None,
        }
    }

    pub const fn query(self, query: &'static [&'static str]) -> Self {
        Self { query, ..self }
    }

    pub const fn fixed(self, fixed_query: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            fixed_query,
            ..self
        }
    }

    pub const fn list(self, pointer: &'static str) -> Self {
        Self {
            list: Some(pointer),
            ..self
        }
    }

    /// Names of the `{placeholders}` in the path
    pub fn path_params(&self) -> Vec<&'static str> {
        let mut params = Vec::new();
        let mut rest = self.path;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            params.push(&rest[start + 1..start + len]);
            rest = &rest[start + len + 1..];
        }
        params
    }

    /// JSON schema for the tool's arguments
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let path_params = self.path_params();

        for param in &path_params {
            properties.insert(param.to_string(), json!({ "type": "string" }));
        }
        for param in self.query {
            properties.insert(param.to_string(), json!({ "type": "string" }));
        }
        if self.list.is_some() {
            properties.insert(
                "cursor".to_string(),
                json!({ "type": "string", "description": "Continuation token from a previous page" }),
            );
            properties.insert(
                "limit".to_string(),
                json!({ "type": "integer", "minimum": 1, "description": "Maximum items to return" }),
            );
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": path_params,
        })
    }

    /// Fill path placeholders from arguments
    pub fn render_path(&self, arguments: &Value) -> Result<String> {
        let mut path = self.path.to_string();
        for param in self.path_params() {
            let value = argument_string(arguments, param)
                .ok_or_else(|| anyhow!("missing required argument '{}'", param))?;
            if !is_path_segment(&value) {
                bail!("invalid value for '{}': {:?}", param, value);
            }
            path = path.replace(&format!("{{{}}}", param), &value);
        }
        Ok(path)
    }

    /// Query pairs for a request: fixed ones first, then supplied arguments
    pub fn render_query(&self, arguments: &Value) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .fixed_query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for param in self.query {
            if let Some(value) = argument_string(arguments, param) {
                query.push((param.to_string(), value));
            }
        }
        query
    }

    /// Cut one page out of a list response; other responses pass through
    pub fn shape_response(&self, response: Value, arguments: &Value, default_limit: usize) -> Result<Value> {
        let Some(pointer) = self.list else {
            return Ok(response);
        };

        let items = match response.pointer(pointer) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => bail!(
                "expected a list at '{}' in {} response, found {}",
                pointer,
                self.tool,
                type_name(other)
            ),
        };

        let cursor = arguments.get("cursor").and_then(Value::as_str);
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(default_limit);

        Ok(serde_json::to_value(paginate(items, cursor, limit))?)
    }
}

/// A single literal path segment: RFC 3986 unreserved characters plus the
/// sub-delimiters backends use in names (`logs-*`, `a,b`). Dot segments are
/// refused, and so is `:`, which `Url::join` reads as a scheme when it lands
/// in the first segment.
fn is_path_segment(value: &str) -> bool {
    if value.is_empty() || value == "." || value == ".." {
        return false;
    }
    value.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '*' | ',' | '+' | '=')
    })
}

fn argument_string(arguments: &Value, name: &str) -> Option<String> {
    match arguments.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Handler for one endpoint
struct EndpointHandler {
    backend: Arc<HttpBackend>,
    spec: EndpointSpec,
    page_size: usize,
}

#[async_trait]
impl ToolHandler for EndpointHandler {
    async fn call(&self, arguments: Value) -> Result<Value> {
        let path = self.spec.render_path(&arguments)?;
        let query = self.spec.render_query(&arguments);
        let response = self.backend.get_json(&path, &query).await?;
        self.spec.shape_response(response, &arguments, self.page_size)
    }
}

struct Connected {
    backend: Arc<HttpBackend>,
    page_size: usize,
}

/// An HTTP backend exposed through a fixed endpoint table
pub struct EndpointService {
    name: &'static str,
    /// Backend config key consulted when `name` has none
    fallback_backend: Option<&'static str>,
    endpoints: &'static [EndpointSpec],
    connected: OnceLock<Connected>,
    closed: AtomicBool,
}

impl EndpointService {
    pub fn new(name: &'static str, endpoints: &'static [EndpointSpec]) -> Self {
        Self {
            name,
            fallback_backend: None,
            endpoints,
            connected: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Reuse another service's backend settings when this one has none
    pub fn with_fallback_backend(mut self, backend: &'static str) -> Self {
        self.fallback_backend = Some(backend);
        self
    }

    fn connection(&self) -> Option<&Connected> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.connected.get()
    }
}

#[async_trait]
impl Service for EndpointService {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&self, config: &AppConfig) -> Result<()> {
        if self.connected.get().is_some() {
            bail!("service '{}' is already initialized", self.name);
        }

        let backend_config = config
            .backend(self.name)
            .or_else(|| self.fallback_backend.and_then(|b| config.backend(b)));
        let backend = HttpBackend::connect(self.name, backend_config)?;
        info!("Service '{}' using {}", self.name, backend.base_url());

        self.connected
            .set(Connected {
                backend: Arc::new(backend),
                page_size: config.default_page_size,
            })
            .map_err(|_| anyhow!("service '{}' initialized concurrently", self.name))
    }

    fn is_enabled(&self) -> bool {
        self.connection().is_some()
    }

    fn capabilities(&self) -> Vec<ToolDefinition> {
        if !self.is_enabled() {
            return vec![];
        }
        self.endpoints
            .iter()
            .map(|spec| ToolDefinition::new(self.name, spec.tool, spec.description, spec.input_schema()))
            .collect()
    }

    fn executors(&self) -> HashMap<String, BoxedHandler> {
        let Some(connected) = self.connection() else {
            return HashMap::new();
        };
        self.endpoints
            .iter()
            .map(|spec| {
                let handler: BoxedHandler = Arc::new(EndpointHandler {
                    backend: connected.backend.clone(),
                    spec: *spec,
                    page_size: connected.page_size,
                });
                (spec.tool.to_string(), handler)
            })
            .collect()
    }

    fn as_closeable(&self) -> Option<&dyn Closeable> {
        Some(self)
    }
}

#[async_trait]
impl Closeable for EndpointService {
    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) && self.connected.get().is_some() {
            info!("Closed service '{}'", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsbridge_core::pagination::decode_cursor;
    use opsbridge_core::BackendConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PODS: EndpointSpec = EndpointSpec::get(
        "kubernetes_list_pods",
        "List pods",
        "/api/v1/namespaces/{namespace}/pods",
    )
    .query(&["labelSelector"])
    .fixed(&[("limit", "500")])
    .list("/items");

    const HEALTH: EndpointSpec = EndpointSpec::get("es_health", "Health", "/_cluster/health");

    static TABLE: &[EndpointSpec] = &[PODS, HEALTH];

    #[test]
    fn test_path_params() {
        assert_eq!(PODS.path_params(), vec!["namespace"]);
        assert!(HEALTH.path_params().is_empty());

        let spec = EndpointSpec::get("t", "d", "/a/{x}/b/{y}");
        assert_eq!(spec.path_params(), vec!["x", "y"]);
    }

    #[test]
    fn test_input_schema() {
        let schema = PODS.input_schema();
        assert_eq!(schema["required"], json!(["namespace"]));
        assert!(schema["properties"]["labelSelector"].is_object());
        assert!(schema["properties"]["cursor"].is_object());
        assert!(HEALTH.input_schema()["properties"]["cursor"].is_null());
    }

    #[test]
    fn test_render_path_and_query() {
        let args = json!({"namespace": "kube-system", "labelSelector": "app=dns"});
        assert_eq!(
            PODS.render_path(&args).unwrap(),
            "/api/v1/namespaces/kube-system/pods"
        );
        assert_eq!(
            PODS.render_query(&args),
            vec![
                ("limit".to_string(), "500".to_string()),
                ("labelSelector".to_string(), "app=dns".to_string()),
            ]
        );

        let err = PODS.render_path(&json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'namespace'"));
        assert!(PODS.render_path(&json!({"namespace": "../secrets"})).is_err());
    }

    #[test]
    fn test_render_path_rejects_escapes() {
        for bad in ["", ".", "..", "a/b", "x?fieldSelector=a#", "x#frag", "a%2Fb", "a b", "naïve", "evil:x", "user@host"] {
            let err = PODS.render_path(&json!({ "namespace": bad })).unwrap_err();
            assert!(err.to_string().contains("invalid value"), "{:?} accepted", bad);
        }

        for good in ["kube-system", "logs-*", "v1.2_x~y", "a,b", "a+b=c"] {
            let path = PODS.render_path(&json!({ "namespace": good })).unwrap();
            assert_eq!(path, format!("/api/v1/namespaces/{}/pods", good));
        }
    }

    #[test]
    fn test_shape_response_paginates() {
        let response = json!({"items": [1, 2, 3, 4, 5]});
        let page = PODS
            .shape_response(response.clone(), &json!({"limit": 2}), 50)
            .unwrap();
        assert_eq!(page["items"], json!([1, 2]));
        assert_eq!(page["hasMore"], true);
        assert_eq!(page["remainingCount"], 3);

        let cursor = page["nextCursor"].as_str().unwrap();
        assert_eq!(decode_cursor(cursor), 2);

        let next = PODS
            .shape_response(response, &json!({"limit": 2, "cursor": cursor}), 50)
            .unwrap();
        assert_eq!(next["items"], json!([3, 4]));
    }

    #[test]
    fn test_shape_response_shapes() {
        let page = PODS.shape_response(json!({}), &json!({}), 50).unwrap();
        assert_eq!(page["total"], 0);

        assert!(PODS
            .shape_response(json!({"items": "nope"}), &json!({}), 50)
            .is_err());

        let passthrough = HEALTH.shape_response(json!({"status": "green"}), &json!({}), 50).unwrap();
        assert_eq!(passthrough, json!({"status": "green"}));
    }

    #[tokio::test]
    async fn test_service_lifecycle_without_backend() {
        let service = EndpointService::new("elasticsearch", TABLE);
        assert!(!service.is_enabled());
        assert!(service.capabilities().is_empty());

        let err = service.initialize(&AppConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("no backend configuration"));
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_fallback_backend() {
        let service = EndpointService::new("helm", TABLE).with_fallback_backend("kubernetes");
        let config = AppConfig::builder()
            .backend("kubernetes", BackendConfig::with_url("https://k8s:6443"))
            .build();

        service.initialize(&config).await.unwrap();
        assert!(service.is_enabled());
        assert_eq!(service.capabilities().len(), 2);
        assert_eq!(service.executors().len(), 2);

        service.close().await.unwrap();
        assert!(!service.is_enabled());
        assert!(service.executors().is_empty());
    }

    /// Serve one canned JSON response and hand back the request line
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_handler_round_trip() {
        let (url, server) = serve_once(r#"{"items": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}"#).await;

        let service = EndpointService::new("kubernetes", TABLE);
        let config = AppConfig::builder()
            .backend("kubernetes", BackendConfig::with_url(&url))
            .default_page_size(2)
            .build();
        service.initialize(&config).await.unwrap();

        let handler = service.executors().remove("kubernetes_list_pods").unwrap();
        let page = handler
            .call(json!({"namespace": "default", "labelSelector": "app=web"}))
            .await
            .unwrap();

        assert_eq!(page["items"], json!([{"name": "a"}, {"name": "b"}]));
        assert_eq!(page["total"], 3);
        assert_eq!(page["hasMore"], true);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /api/v1/namespaces/default/pods?"));
        assert!(request_line.contains("labelSelector=app%3Dweb"));
    }
}
