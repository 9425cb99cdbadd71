//! Configuration for opsbridge
//!
//! Loaded from a JSON or YAML file (chosen by extension), then optionally
//! overridden from `OPSBRIDGE_*` environment variables.
//!
//! ```yaml
//! disabled_services: [jaeger]
//! disabled_tools: [kubernetes_list_secrets]
//! backends:
//!   kubernetes:
//!     url: https://10.0.0.1:6443
//!     auth: { type: bearer, token: "..." }
//!   prometheus:
//!     url: http://prometheus:9090
//!     timeout_secs: 10
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pagination::DEFAULT_PAGE_SIZE;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "OPSBRIDGE_";

/// Paths checked by [`AppConfig::load_default`], in order
pub const CONFIG_PATHS: &[&str] = &[
    "/etc/opsbridge/config.yaml",
    "/etc/opsbridge/config.json",
    "opsbridge.yaml",
    "opsbridge.json",
];

/// Top-level process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Services excluded before construction
    #[serde(default)]
    pub disabled_services: Vec<String>,

    /// Allow-list of services; when non-empty every other service is excluded
    #[serde(default)]
    pub enabled_services: Vec<String>,

    /// Tools suppressed at registration time
    #[serde(default)]
    pub disabled_tools: Vec<String>,

    /// Connection settings keyed by service name
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,

    /// Page size for list tools when the caller does not pass `limit`
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            disabled_services: vec![],
            enabled_services: vec![],
            disabled_tools: vec![],
            backends: BTreeMap::new(),
            default_page_size: default_page_size(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON or YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config from {}: {}", path.display(), e))
        })?;

        let is_yaml = path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);

        let config = Self::parse(&content, is_yaml)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from default paths, falling back to an empty configuration
    pub fn load_default() -> Result<Self> {
        for path in CONFIG_PATHS {
            if Path::new(path).exists() {
                return Self::load(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn parse(content: &str, is_yaml: bool) -> std::result::Result<Self, String> {
        if is_yaml {
            serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {}", e))
        } else {
            serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))
        }
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Connection settings for one service, if configured
    pub fn backend(&self, service: &str) -> Option<&BackendConfig> {
        self.backends.get(service)
    }

    /// Apply `OPSBRIDGE_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self, services: &[&str]) {
        self.apply_overrides_from(services, |key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys:
    /// - `OPSBRIDGE_DISABLED_SERVICES`, `OPSBRIDGE_ENABLED_SERVICES`,
    ///   `OPSBRIDGE_DISABLED_TOOLS`: comma separated, replace the file value
    /// - `OPSBRIDGE_<SERVICE>_URL`, `OPSBRIDGE_<SERVICE>_TOKEN`,
    ///   `OPSBRIDGE_<SERVICE>_TIMEOUT_SECS`: per backend
    pub fn apply_overrides_from<F>(&mut self, services: &[&str], lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: String| lookup(&key).filter(|v| !v.trim().is_empty());

        if let Some(list) = lookup(format!("{}DISABLED_SERVICES", ENV_PREFIX)) {
            self.disabled_services = split_list(&list);
        }
        if let Some(list) = lookup(format!("{}ENABLED_SERVICES", ENV_PREFIX)) {
            self.enabled_services = split_list(&list);
        }
        if let Some(list) = lookup(format!("{}DISABLED_TOOLS", ENV_PREFIX)) {
            self.disabled_tools = split_list(&list);
        }

        for service in services {
            let key = format!("{}{}", ENV_PREFIX, service.to_uppercase());

            if let Some(url) = lookup(format!("{}_URL", key)) {
                debug!("Overriding {} url from environment", service);
                self.backends.entry(service.to_string()).or_default().url = Some(url);
            }
            if let Some(token) = lookup(format!("{}_TOKEN", key)) {
                debug!("Overriding {} token from environment", service);
                self.backends.entry(service.to_string()).or_default().auth =
                    Some(BackendAuth::Bearer { token });
            }
            if let Some(secs) = lookup(format!("{}_TIMEOUT_SECS", key)) {
                match secs.trim().parse() {
                    Ok(secs) => {
                        self.backends
                            .entry(service.to_string())
                            .or_default()
                            .timeout_secs = secs
                    }
                    Err(_) => debug!("Ignoring non-numeric timeout for {}: {}", service, secs),
                }
            }
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Builder for AppConfig
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn disable_service(mut self, name: &str) -> Self {
        self.config.disabled_services.push(name.to_string());
        self
    }

    pub fn enable_service(mut self, name: &str) -> Self {
        self.config.enabled_services.push(name.to_string());
        self
    }

    pub fn disable_tool(mut self, name: &str) -> Self {
        self.config.disabled_tools.push(name.to_string());
        self
    }

    pub fn backend(mut self, name: &str, backend: BackendConfig) -> Self {
        self.config.backends.insert(name.to_string(), backend);
        self
    }

    pub fn default_page_size(mut self, size: usize) -> Self {
        self.config.default_page_size = size;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

/// Connection settings for one backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Optional authentication
    #[serde(default)]
    pub auth: Option<BackendAuth>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Accept self-signed certificates (lab clusters)
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout(),
            auth: None,
            headers: BTreeMap::new(),
            insecure_skip_verify: false,
        }
    }
}

impl BackendConfig {
    /// Backend at the given URL with default settings
    pub fn with_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    /// Use bearer token authentication
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.auth = Some(BackendAuth::Bearer {
            token: token.to_string(),
        });
        self
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Authentication for a backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendAuth {
    Bearer { token: String },
    Basic { username: String, password: String },
}
