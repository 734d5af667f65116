//! Observable coordinator state.

use serde_json::Value;
use std::sync::Arc;

use crate::error::RequestError;

/// Snapshot of one query's lifecycle, owned exclusively by its
/// [`QueryManager`](crate::QueryManager).
///
/// Transitions are monotonic within one request cycle:
/// `is_loading = true` then either (`loaded = true`, data, no error) or
/// (`loaded = true`, error, no data). A new cycle (changed packet or an
/// invalidation) starts the sequence over.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// A request for the current fingerprint is in flight.
    pub is_loading: bool,
    /// The current fingerprint has settled at least once.
    pub loaded: bool,
    /// Data from the last settlement, shared with the cache.
    pub data: Option<Arc<Value>>,
    /// Error from the last settlement.
    pub error: Option<RequestError>,
}

impl QueryState {
    pub(crate) fn settle_data(&mut self, data: Arc<Value>) {
        self.is_loading = false;
        self.loaded = true;
        self.data = Some(data);
        self.error = None;
    }

    pub(crate) fn settle_error(&mut self, error: RequestError) {
        self.is_loading = false;
        self.loaded = true;
        self.data = None;
        self.error = Some(error);
    }
}

/// Per-name snapshot of one mutation's lifecycle.
///
/// Starts `{running: false, finished: false}`; each invocation resets to
/// `{running: true, finished: false}` regardless of prior `finished`, and each
/// settlement (success or failure) lands on `{running: false, finished: true}`.
#[derive(Debug, Clone, Default)]
pub struct MutationState {
    /// A request for this mutation is in flight.
    pub running: bool,
    /// This mutation has settled at least once since its last invocation.
    pub finished: bool,
    /// Error from the last settlement, if it failed.
    pub error: Option<RequestError>,
}

/// Callback invoked with a fresh [`QueryState`] on every transition.
///
/// The binding layer translates this into a re-render. Notification is always
/// deferred off the stack that produced the transition, so an observer can
/// never re-enter the coordinator during the evaluation pass that triggered
/// it.
pub type StateObserver = Arc<dyn Fn(QueryState) + Send + Sync>;

/// Callback invoked with a mutation's name and fresh [`MutationState`] on
/// every transition.
pub type MutationObserver = Arc<dyn Fn(&str, MutationState) + Send + Sync>;
