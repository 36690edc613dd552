//! Outbound HTTP seam used by the gateway

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::config::GatewayConfig;
use crate::errors::{ProviderError, ProviderResult};
use crate::utils::url::UrlUtils;

/// HTTP status the upstream uses to signal throttling
pub const TOO_MANY_REQUESTS: u16 = 429;

/// One outbound GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    /// Provider name, used in logs and error messages
    pub label: &'static str,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl GatewayRequest {
    pub fn get<S: Into<String>>(label: &'static str, url: S) -> Self {
        Self {
            label,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Full URL with credentials masked, safe for logs
    pub fn display_url(&self) -> String {
        UrlUtils::obfuscate_credentials(&UrlUtils::with_query(&self.url, &self.query))
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn new<S: Into<String>>(status: u16, body: S) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_throttled(&self) -> bool {
        self.status == TOO_MANY_REQUESTS
    }

    /// Decode the body as JSON, reporting failures against `provider`
    pub fn json<T: DeserializeOwned>(&self, provider: &str) -> ProviderResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| ProviderError::malformed(provider, e.to_string()))
    }
}

/// Performs a single HTTP exchange; retries and pacing live in the gateway
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &GatewayRequest) -> ProviderResult<GatewayResponse>;
}

/// Production transport backed by `reqwest`
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &GatewayConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &GatewayRequest) -> ProviderResult<GatewayResponse> {
        let display_url = request.display_url();
        trace!("{} GET {}", request.label, display_url);

        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    url: display_url.clone(),
                }
            } else {
                ProviderError::network(format!("{}: {}", display_url, e.without_url()))
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    url: display_url.clone(),
                }
            } else {
                ProviderError::network(format!("Failed to read response from {display_url}"))
            }
        })?;

        Ok(GatewayResponse { status, body })
    }
}
