//! HTTP transport implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use graphlink_core::{GraphRequest, GraphTransport, RequestError};

use crate::config::HttpTransportConfig;
use crate::error::Result;
use crate::response::WireResponse;

/// GraphQL-over-HTTP transport: POSTs operations as JSON to one endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    config: Arc<HttpTransportConfig>,
}

impl HttpTransport {
    /// Create a transport for the given endpoint with default configuration.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_config(HttpTransportConfig::new(endpoint))
    }

    /// Create a transport with custom configuration.
    pub fn with_config(config: HttpTransportConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    async fn post(&self, request: &GraphRequest) -> std::result::Result<Value, RequestError> {
        debug!(document = %request.document, endpoint = %self.config.endpoint, "executing GraphQL request");

        let mut http_request = self.http.post(&self.config.endpoint);
        for (name, value) in &self.config.default_headers {
            http_request = http_request.header(name.as_str(), value.as_str());
        }
        http_request = http_request.header("Content-Type", "application/json");

        let response = http_request
            .json(request)
            .send()
            .await
            .map_err(|error| RequestError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::Transport(format!(
                "HTTP {status} from {}",
                self.config.endpoint
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|error| RequestError::Transport(error.to_string()))?;
        wire.into_result()
    }
}

#[async_trait]
impl GraphTransport for HttpTransport {
    async fn query(&self, request: &GraphRequest) -> std::result::Result<Value, RequestError> {
        self.post(request).await
    }

    async fn mutate(&self, request: &GraphRequest) -> std::result::Result<Value, RequestError> {
        self.post(request).await
    }
}
