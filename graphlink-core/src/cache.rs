//! Fingerprint-keyed request cache with in-flight deduplication.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::error::RequestError;
use crate::fingerprint::Fingerprint;

/// Settled outcome of one request, shared by every deduplicated consumer.
pub type Settled = std::result::Result<Arc<Value>, RequestError>;

/// Cloneable handle to an in-flight request's settlement.
pub type RequestFuture = Shared<BoxFuture<'static, Settled>>;

/// Last resolved outcome for a fingerprint.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Data from the last settlement, if it succeeded.
    pub data: Option<Arc<Value>>,
    /// Error from the last settlement, if it failed.
    pub error: Option<RequestError>,
    /// When the entry settled.
    pub resolved_at: Instant,
}

impl CacheEntry {
    fn from_settled(settled: &Settled) -> Self {
        match settled {
            Ok(data) => Self {
                data: Some(Arc::clone(data)),
                error: None,
                resolved_at: Instant::now(),
            },
            Err(error) => Self {
                data: None,
                error: Some(error.clone()),
                resolved_at: Instant::now(),
            },
        }
    }
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    pending: Option<RequestFuture>,
    /// Ticket of the pending request; a writeback with a mismatched ticket
    /// was orphaned by an invalidation and must not repopulate the slot.
    ticket: u64,
}

#[derive(Default)]
struct CacheInner {
    slots: HashMap<Fingerprint, Slot>,
    tickets: u64,
}

/// Shared cache mapping request fingerprints to their most recent outcome
/// and to the single in-flight request for that fingerprint.
///
/// This is a correctness cache, not a size-bounded one: entries are only
/// replaced by a later settlement or an explicit [`invalidate`](Self::invalidate),
/// never evicted by time. Cloning shares the underlying storage.
#[derive(Clone, Default)]
pub struct RequestCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl RequestCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last resolved outcome for a fingerprint, if any.
    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.inner
            .lock()
            .slots
            .get(fingerprint)
            .and_then(|slot| slot.entry.clone())
    }

    /// Whether a request for this fingerprint is currently in flight.
    pub fn is_pending(&self, fingerprint: &Fingerprint) -> bool {
        self.inner
            .lock()
            .slots
            .get(fingerprint)
            .is_some_and(|slot| slot.pending.is_some())
    }

    /// Join or start the single in-flight request for a fingerprint.
    ///
    /// If a request is already pending, returns a handle to it and `factory`
    /// is never invoked; otherwise starts the request, records it as pending,
    /// and on settlement stores the resolved [`CacheEntry`] and clears the
    /// pending slot. Settlement is driven by a spawned task, so it completes
    /// even if every consumer drops its handle first.
    pub fn begin_request<F>(&self, fingerprint: &Fingerprint, factory: F) -> RequestFuture
    where
        F: FnOnce() -> BoxFuture<'static, Settled>,
    {
        let mut inner = self.inner.lock();
        if let Some(pending) = inner
            .slots
            .get(fingerprint)
            .and_then(|slot| slot.pending.clone())
        {
            debug!(fingerprint = %fingerprint, "joining in-flight request");
            return pending;
        }

        inner.tickets += 1;
        let ticket = inner.tickets;
        debug!(fingerprint = %fingerprint, ticket, "issuing request");

        let storage = Arc::clone(&self.inner);
        let key = fingerprint.clone();
        let request = factory();
        let future: RequestFuture = async move {
            let settled = request.await;
            let mut inner = storage.lock();
            if let Some(slot) = inner.slots.get_mut(&key) {
                if slot.ticket == ticket {
                    slot.entry = Some(CacheEntry::from_settled(&settled));
                    slot.pending = None;
                }
            }
            settled
        }
        .boxed()
        .shared();

        let slot = inner.slots.entry(fingerprint.clone()).or_default();
        slot.pending = Some(future.clone());
        slot.ticket = ticket;

        // Settle regardless of whether any consumer is still polling.
        let _ = tokio::spawn(future.clone());
        future
    }

    /// Clear the cached outcome for a fingerprint, forcing the next
    /// [`begin_request`](Self::begin_request) to hit the transport.
    ///
    /// Any in-flight request for the fingerprint is detached: consumers
    /// already attached to it still see its settlement, but the cache slot
    /// will not be repopulated by it.
    pub fn invalidate(&self, fingerprint: &Fingerprint) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.get_mut(fingerprint) {
            debug!(fingerprint = %fingerprint, "invalidating cache entry");
            slot.entry = None;
            slot.pending = None;
            slot.ticket = 0;
        }
    }

    /// Drop every entry and pending request. Intended for test teardown.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        debug!("request cache cleared");
    }

    /// Number of fingerprints with a resolved entry.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .slots
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    /// Whether the cache holds no resolved entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
