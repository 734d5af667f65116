//! Client registry with a single default slot.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::transport::SharedTransport;

/// Registry mapping client ids to configured transports, with one default.
///
/// Explicitly constructed and injected rather than process-global: build one
/// at startup (usually through [`GraphRuntime`](crate::GraphRuntime)), hand it
/// to the binding layer, and call [`reset`](Self::reset) between test runs.
/// Constructing a coordinator with no explicit client and no default
/// registered fails immediately with [`CoreError::NoClient`].
#[derive(Default)]
pub struct ClientRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    clients: HashMap<String, SharedTransport>,
    default_id: Option<String>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under an id.
    ///
    /// Re-registering an id replaces the previous client; an existing default
    /// mark on that id is kept.
    pub fn register(&self, id: impl Into<String>, client: SharedTransport) {
        let id = id.into();
        debug!(client = %id, "registering GraphQL client");
        self.inner.write().clients.insert(id, client);
    }

    /// Register a client and mark it as the default in one step.
    pub fn register_default(&self, id: impl Into<String>, client: SharedTransport) {
        let id = id.into();
        debug!(client = %id, "registering default GraphQL client");
        let mut inner = self.inner.write();
        inner.clients.insert(id.clone(), client);
        inner.default_id = Some(id);
    }

    /// Mark a previously registered client as the default.
    ///
    /// Exactly one client is default at a time; this replaces any prior mark.
    pub fn set_default(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.clients.contains_key(id) {
            return Err(CoreError::UnknownClient(id.to_string()));
        }
        inner.default_id = Some(id.to_string());
        Ok(())
    }

    /// Look up a client by id.
    pub fn get(&self, id: &str) -> Option<SharedTransport> {
        self.inner.read().clients.get(id).cloned()
    }

    /// Resolve the default client, if one is marked.
    pub fn default_client(&self) -> Option<SharedTransport> {
        let inner = self.inner.read();
        let id = inner.default_id.as_deref()?;
        inner.clients.get(id).cloned()
    }

    /// Drop every registration and the default mark.
    ///
    /// Intended for test teardown.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.clients.clear();
        inner.default_id = None;
        debug!("client registry reset");
    }
}
