//! HTTP transport abstraction so the API client can be driven by a scripted
//! transport in tests.

use super::error::RemoteError;
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::{header, Client, Method, Url};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Path prefix of the versioned API on the configured site
pub const API_PREFIX: &str = "/api/0.6";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Put => f.write_str("PUT"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// A request relative to the API prefix, e.g. `/changeset/create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put_xml(path: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post_xml(path: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One synchronous round trip to the API
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RemoteError>;
}

/// reqwest-backed transport with bearer authentication
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ReqwestTransport {
    /// Build the HTTP client. Each read waits up to `api.read_timeout_seconds`,
    /// which config validation keeps above the server's own processing
    /// timeout. Connecting is bounded separately by
    /// `api.connect_timeout_seconds`.
    pub fn new(config: &ApiConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(config.site.trim_end_matches('/'))
            .map_err(|e| RemoteError::configuration(format!("Invalid API site: {e}")))?;

        let mut builder = Client::builder()
            .read_timeout(Duration::from_secs(config.read_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(config.user_agent.clone());

        if !config.token.is_empty() {
            let mut default_headers = header::HeaderMap::new();
            default_headers.insert(
                header::AUTHORIZATION,
                format!("Bearer {}", config.token)
                    .parse()
                    .map_err(|e| RemoteError::configuration(format!("Invalid token: {e}")))?,
            );
            builder = builder.default_headers(default_headers);
        }

        let client = builder
            .build()
            .map_err(|e| RemoteError::configuration(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %base_url,
            timeout_seconds = config.read_timeout_seconds,
            authenticated = !config.token.is_empty(),
            "Created map API client"
        );

        Ok(Self { client, base_url })
    }

    fn url_for(&self, path: &str) -> Result<Url, RemoteError> {
        let full = format!(
            "{}{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            API_PREFIX,
            path
        );
        Url::parse(&full).map_err(|e| RemoteError::configuration(format!("Invalid URL {full}: {e}")))
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RemoteError> {
        let url = self.url_for(&request.path)?;
        let operation = format!("{} {}", request.method, request.path);
        debug!(url = %url, method = %request.method, "Sending API request");

        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Post => Method::POST,
        };

        let mut builder = self.client.request(method, url);
        if let Some(body) = request.body {
            builder = builder
                .header(header::CONTENT_TYPE, "text/xml")
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::transport(operation.clone(), e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::transport(operation, e.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(!ApiResponse::new(409, "conflict").is_success());
        assert!(!ApiResponse::new(509, "").is_success());
    }

    #[test]
    fn test_transport_builds_versioned_urls() {
        let config = ApiConfig {
            site: "https://api.example.org/".to_string(),
            ..ApiConfig::default()
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        let url = transport.url_for("/changeset/create").unwrap();
        assert_eq!(url.as_str(), "https://api.example.org/api/0.6/changeset/create");
    }

    #[test]
    fn test_transport_rejects_bad_site() {
        let config = ApiConfig {
            site: "not a url".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(RemoteError::Configuration { .. })
        ));
    }
}
