//! # Graphlink Core
//!
//! The query/mutation coordination engine behind Graphlink. It binds GraphQL
//! operations to a host (typically a UI binding layer) so that declaring a
//! query automatically issues the request, deduplicates it against identical
//! in-flight requests, caches the result by request fingerprint, and refetches
//! when a related mutation completes elsewhere in the process.
//!
//! ## Features
//!
//! - **Request deduplication**: N consumers of one fingerprint share a single
//!   in-flight request
//! - **Fingerprint caching**: resolved results are served synchronously to
//!   later consumers of the same query/variables pair
//! - **Mutation invalidation**: an explicit pub/sub bus lets a completed
//!   mutation force every subscribed query to refetch
//! - **Stale-response protection**: responses for an outdated fingerprint or
//!   generation are dropped, never applied out of order
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graphlink_core::{GraphRuntime, QueryPacket, QueryOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), graphlink_core::CoreError> {
//!     let runtime = GraphRuntime::new();
//!     runtime.registry().register_default("main", Arc::new(my_transport));
//!
//!     let query = runtime.query(
//!         QueryPacket::new("query { books { title } }"),
//!         QueryOptions::builder()
//!             .on_mutation("createBook")
//!             .observer(|state| println!("query state: {state:?}"))
//!             .build(),
//!     )?;
//!
//!     query.load();
//!     Ok(())
//! }
//! ```
//!
//! Transports live in companion crates (`graphlink-http` for HTTP POST); the
//! engine depends only on the [`GraphTransport`] trait. All coordinators spawn
//! their settlement work on tokio, so they must be used inside a tokio
//! runtime.

mod bus;
mod cache;
mod error;
mod fingerprint;
mod mutation;
mod options;
mod query;
mod registry;
mod runtime;
mod state;
mod transport;

pub use bus::{InvalidationSubscriber, MutationBus, SubscriptionToken};
pub use cache::{CacheEntry, RequestCache, RequestFuture, Settled};
pub use error::{CoreError, RequestError, Result};
pub use fingerprint::Fingerprint;
pub use mutation::MutationManager;
pub use options::{
    MapState, MutationOptions, MutationOptionsBuilder, MutationPacket, QueryOptions,
    QueryOptionsBuilder, QueryPacket,
};
pub use query::QueryManager;
pub use registry::ClientRegistry;
pub use runtime::GraphRuntime;
pub use state::{MutationObserver, MutationState, QueryState, StateObserver};
pub use transport::{GraphRequest, GraphTransport, SharedTransport};

// Re-export common types
pub use serde_json::Value as JsonValue;
