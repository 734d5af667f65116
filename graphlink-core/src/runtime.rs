//! The shared collaborators behind every coordinator.

use std::sync::Arc;
use tracing::debug;

use crate::bus::MutationBus;
use crate::cache::RequestCache;
use crate::error::Result;
use crate::mutation::MutationManager;
use crate::options::{MutationOptions, MutationPacket, QueryOptions, QueryPacket};
use crate::query::QueryManager;
use crate::registry::ClientRegistry;

/// One process-wide coordination context: the client registry, the shared
/// request cache, and the mutation bus.
///
/// Construct one at startup, hand clones to the binding layer, and call
/// [`reset`](Self::reset) between test runs. Clones share the underlying
/// registry, cache, and bus.
#[derive(Clone, Default)]
pub struct GraphRuntime {
    registry: Arc<ClientRegistry>,
    cache: RequestCache,
    bus: MutationBus,
}

impl GraphRuntime {
    /// Create an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// The client registry.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// The shared request cache.
    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// The mutation bus.
    pub fn bus(&self) -> &MutationBus {
        &self.bus
    }

    /// Construct a [`QueryManager`] for a packet.
    ///
    /// Fails fast with [`CoreError::NoClient`](crate::CoreError::NoClient) if
    /// the options carry no client and no default is registered.
    pub fn query(&self, packet: QueryPacket, options: QueryOptions) -> Result<QueryManager> {
        QueryManager::new(self, packet, options)
    }

    /// Construct a [`MutationManager`] for a packet.
    pub fn mutation(
        &self,
        packet: MutationPacket,
        options: MutationOptions,
    ) -> Result<MutationManager> {
        MutationManager::new(self, packet, options)
    }

    /// Reset registry, cache, and bus. Intended for test teardown.
    pub fn reset(&self) {
        self.registry.reset();
        self.cache.clear();
        self.bus.clear();
        debug!("graph runtime reset");
    }
}
