//! The query coordinator: owns one query's lifecycle.

use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::bus::{InvalidationSubscriber, MutationBus, SubscriptionToken};
use crate::cache::{RequestCache, Settled};
use crate::error::{CoreError, Result};
use crate::fingerprint::Fingerprint;
use crate::options::{MapState, QueryOptions, QueryPacket};
use crate::runtime::GraphRuntime;
use crate::state::{QueryState, StateObserver};
use crate::transport::SharedTransport;

/// Coordinates one query's execution: issues requests through the shared
/// [`RequestCache`], applies settlements to its observable [`QueryState`],
/// and refetches when a subscribed mutation completes.
///
/// Construction resolves the client (explicit option or registry default)
/// and fails fast with [`CoreError::NoClient`] if neither exists. If the
/// shared cache already holds data for the packet's fingerprint, the initial
/// state is served from it synchronously.
///
/// Every settlement is guarded by a generation counter and the fingerprint
/// captured at request start; a response arriving after the packet changed,
/// after an invalidation superseded it, or after disposal is dropped without
/// touching state.
pub struct QueryManager {
    inner: Arc<QueryInner>,
}

impl std::fmt::Debug for QueryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryManager").finish_non_exhaustive()
    }
}

struct CurrentRequest {
    packet: QueryPacket,
    fingerprint: Fingerprint,
}

struct QueryInner {
    client: SharedTransport,
    cache: RequestCache,
    bus: MutationBus,
    observer: Option<StateObserver>,
    map_state: Option<MapState>,
    current: Mutex<CurrentRequest>,
    state: Mutex<QueryState>,
    generation: AtomicU64,
    disposed: AtomicBool,
    subscriptions: Mutex<Vec<(String, SubscriptionToken)>>,
    self_weak: Weak<QueryInner>,
}

impl QueryManager {
    pub(crate) fn new(
        runtime: &GraphRuntime,
        packet: QueryPacket,
        options: QueryOptions,
    ) -> Result<Self> {
        let QueryOptions {
            client,
            cache,
            on_mutation,
            map_state,
            observer,
        } = options;

        let client = client
            .or_else(|| runtime.registry().default_client())
            .ok_or(CoreError::NoClient)?;
        let cache = cache.unwrap_or_else(|| runtime.cache().clone());
        let bus = runtime.bus().clone();

        let fingerprint = packet.fingerprint();
        let mut state = QueryState::default();
        if let Some(entry) = cache.entry(&fingerprint) {
            if let Some(data) = entry.data {
                debug!(fingerprint = %fingerprint, "seeding query state from cache");
                state.settle_data(data);
            }
        }

        let inner = Arc::new_cyclic(|weak| QueryInner {
            client,
            cache,
            bus,
            observer,
            map_state,
            current: Mutex::new(CurrentRequest {
                packet,
                fingerprint,
            }),
            state: Mutex::new(state),
            generation: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            self_weak: weak.clone(),
        });

        let mut subscriptions = Vec::with_capacity(on_mutation.len());
        for identity in on_mutation {
            let subscriber: Weak<QueryInner> = Arc::downgrade(&inner);
            let token = inner.bus.subscribe(identity.clone(), subscriber);
            subscriptions.push((identity, token));
        }
        *inner.subscriptions.lock() = subscriptions;

        Ok(Self { inner })
    }

    /// Snapshot of the current observable state.
    pub fn state(&self) -> QueryState {
        self.inner.state.lock().clone()
    }

    /// The fingerprint of the currently coordinated packet.
    pub fn fingerprint(&self) -> Fingerprint {
        self.inner.current.lock().fingerprint.clone()
    }

    /// Whether this manager has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Begin loading the current packet.
    ///
    /// Idempotent: a no-op while a request is in flight or once the current
    /// fingerprint has loaded successfully. After a failed settlement, a
    /// subsequent call retries. Settlement and all observer notifications
    /// happen on a spawned task, never on this stack.
    pub fn load(&self) {
        self.inner.load();
    }

    /// Swap in a new packet if its fingerprint differs from the current one.
    ///
    /// Unchanged fingerprints are a complete no-op: no request, no state
    /// transition, no notification. A changed fingerprint resets the state
    /// machine to a fresh cycle and loads the new packet; any still-in-flight
    /// response for the old fingerprint will be dropped on arrival.
    pub fn update_if_needed(&self, packet: QueryPacket) {
        self.inner.update_if_needed(packet);
    }

    /// Unsubscribe from every mutation identity and mark the manager inert.
    ///
    /// In-flight responses still settle into the shared cache, but they no
    /// longer mutate this manager's state or notify its observer. Dropping
    /// the manager disposes it implicitly.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for QueryManager {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl QueryInner {
    fn load(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        {
            let state = self.state.lock();
            if state.is_loading || (state.loaded && state.error.is_none()) {
                return;
            }
        }

        let fingerprint = self.current.lock().fingerprint.clone();
        if let Some(entry) = self.cache.entry(&fingerprint) {
            if let Some(data) = entry.data {
                // Serve the cached result; notification is still deferred.
                let generation = self.generation.load(Ordering::SeqCst);
                if let Some(this) = self.self_weak.upgrade() {
                    let _ = tokio::spawn(async move {
                        this.apply_settled(generation, &fingerprint, Ok(data));
                    });
                }
                return;
            }
        }
        self.spawn_fetch(false);
    }

    fn update_if_needed(&self, packet: QueryPacket) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let fingerprint = packet.fingerprint();
        {
            let mut current = self.current.lock();
            if current.fingerprint == fingerprint {
                return;
            }
            debug!(from = %current.fingerprint, to = %fingerprint, "query packet changed");
            current.packet = packet;
            current.fingerprint = fingerprint;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = QueryState::default();
        self.load();
    }

    /// Refetch the current fingerprint, bypassing any memoized entry.
    fn force_refetch(&self) {
        let fingerprint = self.current.lock().fingerprint.clone();
        debug!(fingerprint = %fingerprint, "invalidation received, forcing refetch");
        self.cache.invalidate(&fingerprint);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.spawn_fetch(true);
    }

    fn spawn_fetch(&self, force: bool) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.state.lock();
            if !force && (state.is_loading || (state.loaded && state.error.is_none())) {
                return;
            }
            state.is_loading = true;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let (fingerprint, request) = {
            let current = self.current.lock();
            (current.fingerprint.clone(), current.packet.to_request())
        };
        let Some(this) = self.self_weak.upgrade() else {
            return;
        };
        let _ = tokio::spawn(async move {
            let loading = this.state.lock().clone();
            this.notify(loading);

            let client = Arc::clone(&this.client);
            let future = this.cache.begin_request(&fingerprint, move || {
                async move { client.query(&request).await.map(Arc::new) }.boxed()
            });
            let settled = future.await;
            this.apply_settled(generation, &fingerprint, settled);
        });
    }

    fn apply_settled(&self, generation: u64, fingerprint: &Fingerprint, settled: Settled) {
        if self.disposed.load(Ordering::SeqCst) {
            debug!(fingerprint = %fingerprint, "dropping response for disposed query");
            return;
        }
        if self.generation.load(Ordering::SeqCst) != generation
            || self.current.lock().fingerprint != *fingerprint
        {
            debug!(fingerprint = %fingerprint, "dropping stale response");
            return;
        }

        let snapshot = {
            let mut state = self.state.lock();
            match settled {
                Ok(data) => state.settle_data(data),
                Err(error) => state.settle_error(error),
            }
            state.clone()
        };
        self.notify(snapshot);
    }

    fn notify(&self, state: QueryState) {
        if let Some(observer) = &self.observer {
            let state = match &self.map_state {
                Some(map) => map(state),
                None => state,
            };
            observer(state);
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for (identity, token) in subscriptions {
            self.bus.unsubscribe(&identity, token);
        }
        debug!("query manager disposed");
    }
}

impl InvalidationSubscriber for QueryInner {
    fn on_invalidate(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.force_refetch();
    }
}
