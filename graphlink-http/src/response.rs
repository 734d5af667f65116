//! GraphQL wire response decoding.

use graphlink_core::RequestError;
use serde::Deserialize;
use serde_json::Value;

/// A GraphQL response body as it comes off the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    /// The data returned by the operation.
    #[serde(default)]
    pub data: Option<Value>,
    /// Errors reported by the server.
    #[serde(default)]
    pub errors: Option<Vec<WireError>>,
    /// Extensions (tracing, caching info, etc.).
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl WireResponse {
    /// Whether the server reported any errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }

    /// Collapse into the engine's data-or-error shape.
    ///
    /// Server errors win over partial data, matching how the coordination
    /// engine treats a settlement as either data or error, never both.
    pub fn into_result(self) -> std::result::Result<Value, RequestError> {
        if let Some(errors) = self.errors {
            if !errors.is_empty() {
                return Err(RequestError::GraphQl {
                    messages: errors.into_iter().map(|error| error.message).collect(),
                });
            }
        }
        self.data.ok_or(RequestError::EmptyResponse)
    }
}

/// A single error object from a GraphQL response.
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    /// Error message.
    pub message: String,
    /// Locations in the document where the error occurred.
    #[serde(default)]
    pub locations: Option<Vec<ErrorLocation>>,
    /// Path to the field that caused the error.
    #[serde(default)]
    pub path: Option<Vec<Value>>,
    /// Additional error extensions.
    #[serde(default)]
    pub extensions: Option<Value>,
}

/// Location in the GraphQL document (1-indexed).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}
