//! The client capability the engine depends on.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::RequestError;

/// A GraphQL operation handed to a transport.
///
/// Serializes to the standard GraphQL-over-HTTP request body shape
/// (`{"query": ..., "variables": ...}`).
#[derive(Debug, Clone, Serialize)]
pub struct GraphRequest {
    /// The GraphQL document (query or mutation).
    #[serde(rename = "query")]
    pub document: String,
    /// Variables for the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphRequest {
    /// Create a request with no variables.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            variables: None,
        }
    }

    /// Attach variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Client capability: executes GraphQL documents and settles with data or an
/// error.
///
/// The engine depends only on this shape. Transport details (HTTP, WebSocket,
/// in-process test doubles) live behind it; retry policy, if any, belongs to
/// the implementation.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// Execute a query document.
    async fn query(&self, request: &GraphRequest) -> std::result::Result<Value, RequestError>;

    /// Execute a mutation document.
    async fn mutate(&self, request: &GraphRequest) -> std::result::Result<Value, RequestError>;
}

/// Non-owning handle to a configured client.
pub type SharedTransport = Arc<dyn GraphTransport>;
