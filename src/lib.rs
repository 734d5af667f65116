// Graphlink - GraphQL query/mutation coordination for Rust
//
// This library binds GraphQL operations to a host application so that
// declaring a query issues, deduplicates, and caches the request, and a
// completed mutation invalidates every subscribed query.

// Re-export the coordination engine
pub use graphlink_core::*;

// Re-export optional transports
#[cfg(feature = "http")]
pub use graphlink_http;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CoreError,
        GraphRequest,
        GraphRuntime,
        GraphTransport,
        JsonValue,
        MutationManager,
        MutationOptions,
        MutationPacket,
        MutationState,
        QueryManager,
        QueryOptions,
        QueryPacket,
        QueryState,
        RequestError,
    };

    #[cfg(feature = "http")]
    pub use graphlink_http::{HttpTransport, HttpTransportConfig};
}
