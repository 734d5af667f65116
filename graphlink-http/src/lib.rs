//! # Graphlink HTTP Transport
//!
//! A reqwest-based implementation of the
//! [`GraphTransport`](graphlink_core::GraphTransport) capability: queries and
//! mutations are POSTed as JSON to a single GraphQL endpoint, and wire
//! responses are decoded into the engine's data/error shape.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graphlink_core::GraphRuntime;
//! use graphlink_http::{HttpTransport, HttpTransportConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = HttpTransportConfig::builder()
//!     .endpoint("https://api.example.com/graphql")
//!     .timeout(Duration::from_secs(10))
//!     .bearer_auth("token123")
//!     .build();
//!
//! let runtime = GraphRuntime::new();
//! runtime
//!     .registry()
//!     .register_default("main", Arc::new(HttpTransport::with_config(config)?));
//! ```
//!
//! Transport-level retry is deliberately absent: the engine never retries on
//! its own, and hosts that want retry wrap the transport.

mod client;
mod config;
mod error;
mod response;

pub use client::HttpTransport;
pub use config::{HttpTransportConfig, HttpTransportConfigBuilder};
pub use error::{Result, TransportError};
pub use response::{ErrorLocation, WireError, WireResponse};
