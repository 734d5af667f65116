//! HTTP transport error types.

use thiserror::Error;

/// Result type for transport construction and configuration.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while building the transport.
///
/// Request-time failures never surface here; they are folded into
/// [`RequestError`](graphlink_core::RequestError) so the engine can store
/// them in observable state.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid transport configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
