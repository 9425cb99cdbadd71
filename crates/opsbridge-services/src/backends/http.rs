//! Shared HTTP client for backend services

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use opsbridge_core::{BackendAuth, BackendConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

/// Longest error body echoed back to the caller
const MAX_ERROR_BODY: usize = 512;

/// A configured client bound to one backend base URL
#[derive(Debug, Clone)]
pub struct HttpBackend {
    service: String,
    base_url: Url,
    client: Client,
}

impl HttpBackend {
    /// Build a client from configuration. Does no network I/O.
    pub fn connect(service: &str, config: Option<&BackendConfig>) -> Result<Self> {
        let config =
            config.ok_or_else(|| anyhow!("no backend configuration for '{}'", service))?;
        let raw_url = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("no url configured for '{}'", service))?;

        let base_url = parse_base_url(raw_url)
            .with_context(|| format!("invalid url for '{}'", service))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers(config)?)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .with_context(|| format!("failed to build HTTP client for '{}'", service))?;

        debug!("Built HTTP client for {} at {}", service, base_url);
        Ok(Self {
            service: service.to_string(),
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path relative to the base URL
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid path '{}'", path))
    }

    /// GET a JSON document
    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url(path)?;
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", self.service, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "{} returned {}: {}",
                self.service,
                status,
                truncate(&body, MAX_ERROR_BODY)
            );
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("{} returned a non-JSON body", self.service))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("unsupported scheme '{}'", url.scheme());
    }
    // Url::join replaces the last segment unless the base ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn default_headers(config: &BackendConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header '{}'", name))?;
        headers.insert(name, value);
    }

    if let Some(auth) = &config.auth {
        let mut value = HeaderValue::from_str(&authorization_value(auth))
            .context("invalid credentials")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

fn authorization_value(auth: &BackendAuth) -> String {
    match auth {
        BackendAuth::Bearer { token } => format!("Bearer {}", token),
        BackendAuth::Basic { username, password } => {
            format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
        }
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_requires_config_and_url() {
        let err = HttpBackend::connect("grafana", None).unwrap_err();
        assert!(err.to_string().contains("no backend configuration"));

        let err = HttpBackend::connect("grafana", Some(&BackendConfig::default())).unwrap_err();
        assert!(err.to_string().contains("no url configured"));
    }

    #[test]
    fn test_connect_rejects_bad_urls() {
        let err = HttpBackend::connect("kibana", Some(&BackendConfig::with_url("not a url")))
            .unwrap_err();
        assert!(err.to_string().contains("invalid url"));

        let err = HttpBackend::connect("kibana", Some(&BackendConfig::with_url("ftp://kibana")))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("unsupported scheme"));
    }

    #[test]
    fn test_url_keeps_base_path() {
        let backend = HttpBackend::connect(
            "grafana",
            Some(&BackendConfig::with_url("http://proxy:8080/grafana")),
        )
        .unwrap();

        assert_eq!(
            backend.url("/api/search").unwrap().as_str(),
            "http://proxy:8080/grafana/api/search"
        );
    }

    #[test]
    fn test_authorization_values() {
        assert_eq!(
            authorization_value(&BackendAuth::Bearer {
                token: "abc".to_string()
            }),
            "Bearer abc"
        );
        assert_eq!(
            authorization_value(&BackendAuth::Basic {
                username: "admin".to_string(),
                password: "admin".to_string()
            }),
            "Basic YWRtaW46YWRtaW4="
        );
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let mut config = BackendConfig::with_url("http://es:9200");
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(HttpBackend::connect("elasticsearch", Some(&config)).is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
    }
}
