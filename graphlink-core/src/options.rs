//! Coordinator configuration: packets and recognized options.
//!
//! Options are typed structs with builders rather than open-ended maps, so
//! unrecognized fields are unrepresentable and defaults are explicit.

use serde_json::Value;
use std::sync::Arc;

use crate::cache::RequestCache;
use crate::error::{CoreError, Result};
use crate::fingerprint::Fingerprint;
use crate::state::{MutationObserver, MutationState, QueryState, StateObserver};
use crate::transport::{GraphRequest, SharedTransport};

/// The query a [`QueryManager`](crate::QueryManager) coordinates: a GraphQL
/// document plus its variables.
#[derive(Debug, Clone)]
pub struct QueryPacket {
    /// The GraphQL query document.
    pub document: String,
    /// Variables for the query.
    pub variables: Option<Value>,
}

impl QueryPacket {
    /// Create a packet with no variables.
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

    /// The cache key for this packet.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.document, self.variables.as_ref())
    }

    pub(crate) fn to_request(&self) -> GraphRequest {
        GraphRequest {
            document: self.document.clone(),
            variables: self.variables.clone(),
        }
    }
}

/// Transform applied to a [`QueryState`] before the observer sees it.
pub type MapState = Arc<dyn Fn(QueryState) -> QueryState + Send + Sync>;

/// Recognized options for constructing a [`QueryManager`](crate::QueryManager).
///
/// Defaults: the runtime's default client and shared cache, no mutation
/// subscriptions, identity state mapping, no observer.
#[derive(Clone, Default)]
pub struct QueryOptions {
    /// Override the registry's default client.
    pub client: Option<SharedTransport>,
    /// Override the runtime's shared request cache.
    pub cache: Option<RequestCache>,
    /// Mutation identities whose completion forces this query to refetch,
    /// in subscription order.
    pub on_mutation: Vec<String>,
    /// Transform exposed state before handing it to the observer.
    pub map_state: Option<MapState>,
    /// Callback invoked on every state transition.
    pub observer: Option<StateObserver>,
}

impl QueryOptions {
    /// Create an options builder.
    pub fn builder() -> QueryOptionsBuilder {
        QueryOptionsBuilder::default()
    }
}

/// Builder for [`QueryOptions`].
#[derive(Default)]
pub struct QueryOptionsBuilder {
    options: QueryOptions,
}

impl QueryOptionsBuilder {
    /// Use this client instead of the registry default.
    pub fn client(mut self, client: SharedTransport) -> Self {
        self.options.client = Some(client);
        self
    }

    /// Use this cache instead of the runtime's shared one.
    pub fn cache(mut self, cache: RequestCache) -> Self {
        self.options.cache = Some(cache);
        self
    }

    /// Subscribe to a single mutation identity.
    pub fn on_mutation(mut self, mutation: impl Into<String>) -> Self {
        self.options.on_mutation.push(mutation.into());
        self
    }

    /// Subscribe to an ordered list of mutation identities.
    pub fn on_mutations<I, S>(mut self, mutations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .on_mutation
            .extend(mutations.into_iter().map(Into::into));
        self
    }

    /// Transform exposed state before the observer sees it.
    pub fn map_state<F>(mut self, map: F) -> Self
    where
        F: Fn(QueryState) -> QueryState + Send + Sync + 'static,
    {
        self.options.map_state = Some(Arc::new(map));
        self
    }

    /// Observe every state transition.
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(QueryState) + Send + Sync + 'static,
    {
        self.options.observer = Some(Arc::new(observer));
        self
    }

    /// Build the options.
    pub fn build(self) -> QueryOptions {
        self.options
    }
}

/// The named mutations a [`MutationManager`](crate::MutationManager)
/// coordinates, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct MutationPacket {
    mutations: Vec<(String, String)>,
}

impl MutationPacket {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named mutation. The name doubles as the bus identity
    /// broadcast on completion.
    pub fn mutation(mut self, name: impl Into<String>, document: impl Into<String>) -> Self {
        self.mutations.push((name.into(), document.into()));
        self
    }

    /// Declared names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mutations.iter().map(|(name, _)| name.as_str())
    }

    /// Look up a declared document.
    pub fn document(&self, name: &str) -> Option<&str> {
        self.mutations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, document)| document.as_str())
    }

    pub(crate) fn entries(&self) -> &[(String, String)] {
        &self.mutations
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (i, (name, _)) in self.mutations.iter().enumerate() {
            if self.mutations[..i].iter().any(|(n, _)| n == name) {
                return Err(CoreError::DuplicateMutation(name.clone()));
            }
        }
        Ok(())
    }
}

/// Recognized options for constructing a
/// [`MutationManager`](crate::MutationManager).
#[derive(Clone, Default)]
pub struct MutationOptions {
    /// Override the registry's default client.
    pub client: Option<SharedTransport>,
    /// Broadcast invalidation even when the mutation settles with an error.
    ///
    /// Off by default: a failed mutation changed no server state, so
    /// dependent queries are not forced to refetch.
    pub broadcast_on_error: bool,
    /// Callback invoked with the mutation name on every state transition.
    pub observer: Option<MutationObserver>,
}

impl MutationOptions {
    /// Create an options builder.
    pub fn builder() -> MutationOptionsBuilder {
        MutationOptionsBuilder::default()
    }
}

/// Builder for [`MutationOptions`].
#[derive(Default)]
pub struct MutationOptionsBuilder {
    options: MutationOptions,
}

impl MutationOptionsBuilder {
    /// Use this client instead of the registry default.
    pub fn client(mut self, client: SharedTransport) -> Self {
        self.options.client = Some(client);
        self
    }

    /// Broadcast invalidation even on failed settlements.
    pub fn broadcast_on_error(mut self, enabled: bool) -> Self {
        self.options.broadcast_on_error = enabled;
        self
    }

    /// Observe every per-mutation state transition.
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&str, MutationState) + Send + Sync + 'static,
    {
        self.options.observer = Some(Arc::new(observer));
        self
    }

    /// Build the options.
    pub fn build(self) -> MutationOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_options_defaults() {
        let options = QueryOptions::default();
        assert!(options.client.is_none());
        assert!(options.cache.is_none());
        assert!(options.on_mutation.is_empty());
        assert!(options.map_state.is_none());
        assert!(options.observer.is_none());
    }

    #[test]
    fn test_on_mutation_accepts_one_or_many() {
        let options = QueryOptions::builder()
            .on_mutation("createBook")
            .on_mutations(["deleteBook", "renameBook"])
            .build();
        assert_eq!(
            options.on_mutation,
            vec!["createBook", "deleteBook", "renameBook"]
        );
    }

    #[test]
    fn test_packet_fingerprint_tracks_variables() {
        let a = QueryPacket::new("query Q").with_variables(json!({ "page": 1 }));
        let b = QueryPacket::new("query Q").with_variables(json!({ "page": 2 }));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }

    #[test]
    fn test_mutation_packet_order_and_lookup() {
        let packet = MutationPacket::new()
            .mutation("create", "mutation { create }")
            .mutation("delete", "mutation { delete }");
        assert_eq!(packet.names().collect::<Vec<_>>(), vec!["create", "delete"]);
        assert_eq!(packet.document("delete"), Some("mutation { delete }"));
        assert!(packet.document("rename").is_none());
        assert!(packet.validate().is_ok());
    }

    #[test]
    fn test_duplicate_mutation_names_rejected() {
        let packet = MutationPacket::new()
            .mutation("create", "mutation { a }")
            .mutation("create", "mutation { b }");
        assert!(matches!(
            packet.validate(),
            Err(CoreError::DuplicateMutation(name)) if name == "create"
        ));
    }
}
