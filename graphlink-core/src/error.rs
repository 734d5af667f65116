//! Coordination engine error types.

use thiserror::Error;

/// Result type for coordination engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Fatal configuration errors, surfaced at construction time.
///
/// Request failures never appear here; they are recorded in the owning
/// coordinator's state as a [`RequestError`] and handed to observers instead
/// of crossing the async boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No client could be resolved for a coordinator.
    #[error("no GraphQL client is configured; register a default client or pass one explicitly")]
    NoClient,

    /// A client id was referenced that is not registered.
    #[error("unknown client id: {0}")]
    UnknownClient(String),

    /// A mutation name was invoked that the packet does not declare.
    #[error("unknown mutation: {0}")]
    UnknownMutation(String),

    /// A mutation packet declared the same name twice.
    #[error("duplicate mutation name: {0}")]
    DuplicateMutation(String),
}

/// Failure of a single query or mutation request.
///
/// Clonable so one settled outcome can fan out to every consumer that was
/// deduplicated onto the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport failed before a GraphQL response was produced.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server responded with GraphQL errors.
    #[error("GraphQL errors: {}", messages.join("; "))]
    GraphQl {
        /// Error messages as reported by the server.
        messages: Vec<String>,
    },

    /// The response carried neither data nor errors.
    #[error("response contained no data")]
    EmptyResponse,
}

impl RequestError {
    /// Check if this is a transport-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a server-side GraphQL error.
    pub fn is_graphql(&self) -> bool {
        matches!(self, Self::GraphQl { .. })
    }

    /// Get the server error messages, if any.
    pub fn graphql_messages(&self) -> Option<&[String]> {
        match self {
            Self::GraphQl { messages } => Some(messages),
            _ => None,
        }
    }
}
