//! Cross-component coordination workflows.
//!
//! These tests drive the engine end to end with a transport whose
//! settlements are controlled explicitly, so request interleavings
//! (dedup, stale responses, invalidation fan-out) are deterministic.

use async_trait::async_trait;
use graphlink_core::{
    GraphRequest, GraphRuntime, GraphTransport, MutationOptions, MutationPacket, MutationState,
    QueryOptions, QueryOptionsBuilder, QueryPacket, QueryState, RequestError,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Query,
    Mutation,
}

struct PendingCall {
    kind: CallKind,
    document: String,
    respond: oneshot::Sender<Result<Value, RequestError>>,
}

impl PendingCall {
    fn resolve(self, data: Value) {
        self.respond.send(Ok(data)).expect("caller went away");
    }

    fn reject(self, message: &str) {
        self.respond
            .send(Err(RequestError::Transport(message.to_string())))
            .expect("caller went away");
    }
}

/// Transport that parks every call until the test settles it.
#[derive(Clone, Default)]
struct ManualTransport {
    inner: Arc<ManualInner>,
}

#[derive(Default)]
struct ManualInner {
    calls: Mutex<Vec<PendingCall>>,
    notify: Notify,
    queries: AtomicU32,
    mutations: AtomicU32,
}

impl ManualTransport {
    fn new() -> Self {
        Self::default()
    }

    fn query_count(&self) -> u32 {
        self.inner.queries.load(Ordering::SeqCst)
    }

    fn mutation_count(&self) -> u32 {
        self.inner.mutations.load(Ordering::SeqCst)
    }

    async fn next_call(&self) -> PendingCall {
        loop {
            {
                let mut calls = self.inner.calls.lock().unwrap();
                if !calls.is_empty() {
                    return calls.remove(0);
                }
            }
            self.inner.notify.notified().await;
        }
    }

    fn park(&self, kind: CallKind, document: String) -> oneshot::Receiver<Result<Value, RequestError>> {
        let (tx, rx) = oneshot::channel();
        self.inner.calls.lock().unwrap().push(PendingCall {
            kind,
            document,
            respond: tx,
        });
        self.inner.notify.notify_one();
        rx
    }
}

#[async_trait]
impl GraphTransport for ManualTransport {
    async fn query(&self, request: &GraphRequest) -> Result<Value, RequestError> {
        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        let rx = self.park(CallKind::Query, request.document.clone());
        rx.await
            .unwrap_or_else(|_| Err(RequestError::Transport("mock dropped".to_string())))
    }

    async fn mutate(&self, request: &GraphRequest) -> Result<Value, RequestError> {
        self.inner.mutations.fetch_add(1, Ordering::SeqCst);
        let rx = self.park(CallKind::Mutation, request.document.clone());
        rx.await
            .unwrap_or_else(|_| Err(RequestError::Transport("mock dropped".to_string())))
    }
}

fn runtime_with(transport: &ManualTransport) -> GraphRuntime {
    let runtime = GraphRuntime::new();
    runtime
        .registry()
        .register_default("main", Arc::new(transport.clone()));
    runtime
}

type StateStream = mpsc::UnboundedReceiver<QueryState>;

fn recording_options() -> (QueryOptionsBuilder, StateStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let builder = QueryOptions::builder().observer(move |state| {
        let _ = tx.send(state);
    });
    (builder, rx)
}

async fn next_state(states: &mut StateStream) -> QueryState {
    tokio::time::timeout(Duration::from_secs(5), states.recv())
        .await
        .expect("timed out waiting for a state transition")
        .expect("observer channel closed")
}

async fn settle_quietly() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn assert_idle(states: &mut StateStream) {
    assert!(
        states.try_recv().is_err(),
        "expected no further state transitions"
    );
}

#[tokio::test]
async fn query_state_sequence() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.build())
        .unwrap();

    let initial = manager.state();
    assert!(!initial.is_loading);
    assert!(!initial.loaded);
    assert!(initial.data.is_none());

    manager.load();
    let call = transport.next_call().await;
    assert_eq!(call.kind, CallKind::Query);
    assert_eq!(call.document, "Q1");

    let loading = next_state(&mut states).await;
    assert!(loading.is_loading);
    assert!(!loading.loaded);

    call.resolve(json!({ "x": 1 }));
    let loaded = next_state(&mut states).await;
    assert!(!loaded.is_loading);
    assert!(loaded.loaded);
    assert!(loaded.error.is_none());
    assert_eq!(loaded.data.as_deref(), Some(&json!({ "x": 1 })));
}

#[tokio::test]
async fn load_is_idempotent() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.build())
        .unwrap();
    manager.load();
    manager.load();

    let call = transport.next_call().await;
    call.resolve(json!({ "x": 1 }));
    next_state(&mut states).await; // loading
    next_state(&mut states).await; // loaded

    manager.load();
    settle_quietly().await;
    assert_eq!(transport.query_count(), 1);
    assert_idle(&mut states);
}

#[tokio::test]
async fn identical_queries_share_one_request() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options_a, mut states_a) = recording_options();
    let (options_b, mut states_b) = recording_options();

    let first = runtime
        .query(QueryPacket::new("Q1"), options_a.build())
        .unwrap();
    let second = runtime
        .query(QueryPacket::new("Q1"), options_b.build())
        .unwrap();

    first.load();
    second.load();

    let call = transport.next_call().await;
    settle_quietly().await;
    assert_eq!(transport.query_count(), 1, "dedup must share one request");

    call.resolve(json!({ "x": 1 }));
    loop {
        let state = next_state(&mut states_a).await;
        if state.loaded {
            assert_eq!(state.data.as_deref(), Some(&json!({ "x": 1 })));
            break;
        }
    }
    loop {
        let state = next_state(&mut states_b).await;
        if state.loaded {
            assert_eq!(state.data.as_deref(), Some(&json!({ "x": 1 })));
            break;
        }
    }
    assert_eq!(transport.query_count(), 1);
}

#[tokio::test]
async fn unchanged_packet_is_a_complete_noop() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let packet = QueryPacket::new("Q1").with_variables(json!({ "page": 1, "search": "law" }));
    let manager = runtime.query(packet, options.build()).unwrap();
    manager.load();
    transport.next_call().await.resolve(json!({ "x": 1 }));
    next_state(&mut states).await;
    next_state(&mut states).await;

    // Same document, structurally equal variables in a different key order.
    let same = QueryPacket::new("Q1").with_variables(json!({ "search": "law", "page": 1 }));
    manager.update_if_needed(same);

    settle_quietly().await;
    assert_eq!(transport.query_count(), 1);
    assert_idle(&mut states);
    assert!(manager.state().loaded);
}

#[tokio::test]
async fn changed_packet_refetches_and_drops_stale_response() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.build())
        .unwrap();
    manager.load();
    let stale_call = transport.next_call().await;
    next_state(&mut states).await; // loading Q1

    manager.update_if_needed(QueryPacket::new("Q2"));
    let fresh_call = transport.next_call().await;
    assert_eq!(fresh_call.document, "Q2");
    next_state(&mut states).await; // loading Q2

    // The response for the abandoned fingerprint must be discarded.
    stale_call.resolve(json!({ "stale": true }));
    settle_quietly().await;
    assert_idle(&mut states);
    let state = manager.state();
    assert!(state.is_loading);
    assert!(state.data.is_none());

    fresh_call.resolve(json!({ "fresh": true }));
    let settled = next_state(&mut states).await;
    assert_eq!(settled.data.as_deref(), Some(&json!({ "fresh": true })));
}

#[tokio::test]
async fn cache_seeds_a_second_manager_synchronously() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let first = runtime
        .query(QueryPacket::new("Q1"), options.build())
        .unwrap();
    first.load();
    transport.next_call().await.resolve(json!({ "x": 1 }));
    next_state(&mut states).await;
    next_state(&mut states).await;

    let second = runtime
        .query(QueryPacket::new("Q1"), QueryOptions::default())
        .unwrap();
    let state = second.state();
    assert!(state.loaded);
    assert_eq!(state.data.as_deref(), Some(&json!({ "x": 1 })));

    second.load();
    settle_quietly().await;
    assert_eq!(transport.query_count(), 1, "cached data must be served");
}

#[tokio::test]
async fn mutation_completion_refetches_subscribed_query() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.on_mutation("M1").build())
        .unwrap();
    manager.load();
    transport.next_call().await.resolve(json!({ "x": 1 }));
    next_state(&mut states).await;
    next_state(&mut states).await;

    let mutations = runtime
        .mutation(
            MutationPacket::new().mutation("M1", "mutation M1"),
            MutationOptions::default(),
        )
        .unwrap();
    mutations.run_mutation("M1", None).unwrap();

    let mutation_call = transport.next_call().await;
    assert_eq!(mutation_call.kind, CallKind::Mutation);
    mutation_call.resolve(json!({ "done": true }));

    // The subscribed query re-enters Loading without caller action.
    let refetch = transport.next_call().await;
    assert_eq!(refetch.kind, CallKind::Query);
    assert_eq!(refetch.document, "Q1");
    let loading = next_state(&mut states).await;
    assert!(loading.is_loading);

    refetch.resolve(json!({ "x": 2 }));
    let settled = next_state(&mut states).await;
    assert_eq!(settled.data.as_deref(), Some(&json!({ "x": 2 })));
    assert_eq!(transport.query_count(), 2);
    assert_eq!(transport.mutation_count(), 1);
}

#[tokio::test]
async fn failed_mutation_does_not_broadcast() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.on_mutation("M1").build())
        .unwrap();
    manager.load();
    transport.next_call().await.resolve(json!({ "x": 1 }));
    next_state(&mut states).await;
    next_state(&mut states).await;

    let (mutation_tx, mut mutation_states) = mpsc::unbounded_channel::<(String, MutationState)>();
    let mutations = runtime
        .mutation(
            MutationPacket::new().mutation("M1", "mutation M1"),
            MutationOptions::builder()
                .observer(move |name, state| {
                    let _ = mutation_tx.send((name.to_string(), state));
                })
                .build(),
        )
        .unwrap();
    mutations.run_mutation("M1", None).unwrap();
    transport.next_call().await.reject("rejected");

    // The local state still finishes, with the error attached.
    loop {
        let (_, state) = mutation_states.recv().await.unwrap();
        if state.finished {
            assert!(state.error.is_some());
            break;
        }
    }

    settle_quietly().await;
    assert_eq!(transport.query_count(), 1, "failed mutations must not fan out");
    assert_idle(&mut states);
}

#[tokio::test]
async fn broadcast_on_error_is_an_explicit_opt_in() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.on_mutation("M1").build())
        .unwrap();
    manager.load();
    transport.next_call().await.resolve(json!({ "x": 1 }));
    next_state(&mut states).await;
    next_state(&mut states).await;

    let mutations = runtime
        .mutation(
            MutationPacket::new().mutation("M1", "mutation M1"),
            MutationOptions::builder().broadcast_on_error(true).build(),
        )
        .unwrap();
    mutations.run_mutation("M1", None).unwrap();
    transport.next_call().await.reject("rejected");

    let refetch = transport.next_call().await;
    assert_eq!(refetch.kind, CallKind::Query);
    refetch.resolve(json!({ "x": 2 }));
    loop {
        let state = next_state(&mut states).await;
        if state.loaded && state.data.is_some() {
            assert_eq!(state.data.as_deref(), Some(&json!({ "x": 2 })));
            break;
        }
    }
}

#[tokio::test]
async fn disposed_manager_is_skipped_by_invalidation() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options_a, mut states_a) = recording_options();
    let (options_b, mut states_b) = recording_options();

    let first = runtime
        .query(QueryPacket::new("QA"), options_a.on_mutation("M1").build())
        .unwrap();
    let second = runtime
        .query(QueryPacket::new("QB"), options_b.on_mutation("M1").build())
        .unwrap();

    first.load();
    transport.next_call().await.resolve(json!({ "a": 1 }));
    second.load();
    transport.next_call().await.resolve(json!({ "b": 1 }));
    for states in [&mut states_a, &mut states_b] {
        next_state(states).await;
        next_state(states).await;
    }

    first.dispose();

    let mutations = runtime
        .mutation(
            MutationPacket::new().mutation("M1", "mutation M1"),
            MutationOptions::default(),
        )
        .unwrap();
    mutations.run_mutation("M1", None).unwrap();
    transport.next_call().await.resolve(json!({ "done": true }));

    // Only the still-subscribed manager refetches.
    let refetch = transport.next_call().await;
    assert_eq!(refetch.document, "QB");
    refetch.resolve(json!({ "b": 2 }));
    loop {
        let state = next_state(&mut states_b).await;
        if state.data.as_deref() == Some(&json!({ "b": 2 })) {
            break;
        }
    }

    settle_quietly().await;
    assert_idle(&mut states_a);
    assert_eq!(transport.query_count(), 3);
}

#[tokio::test]
async fn disposal_makes_inflight_response_a_noop() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.build())
        .unwrap();
    manager.load();
    let call = transport.next_call().await;
    next_state(&mut states).await; // loading

    manager.dispose();
    call.resolve(json!({ "x": 1 }));
    settle_quietly().await;

    assert_idle(&mut states);
    assert!(!manager.state().loaded);

    // The settlement still lands in the shared cache for other consumers.
    let fingerprint = QueryPacket::new("Q1").fingerprint();
    assert!(runtime.cache().entry(&fingerprint).is_some());
}

#[tokio::test]
async fn overlapping_mutations_broadcast_per_settlement() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.on_mutation("M1").build())
        .unwrap();
    manager.load();
    transport.next_call().await.resolve(json!({ "v": 1 }));
    next_state(&mut states).await;
    next_state(&mut states).await;

    let mutations = runtime
        .mutation(
            MutationPacket::new().mutation("M1", "mutation M1"),
            MutationOptions::default(),
        )
        .unwrap();

    // Two invocations before either settles.
    mutations.run_mutation("M1", None).unwrap();
    mutations.run_mutation("M1", None).unwrap();
    let first_mutation = transport.next_call().await;
    let second_mutation = transport.next_call().await;
    assert_eq!(transport.mutation_count(), 2);

    first_mutation.resolve(json!({ "done": 1 }));
    let first_refetch = transport.next_call().await;
    assert_eq!(first_refetch.kind, CallKind::Query);

    second_mutation.resolve(json!({ "done": 2 }));
    let second_refetch = transport.next_call().await;
    assert_eq!(second_refetch.kind, CallKind::Query);

    // The first refetch was superseded by the second broadcast; its
    // response must be dropped in favor of the later one.
    first_refetch.resolve(json!({ "v": 2 }));
    second_refetch.resolve(json!({ "v": 3 }));

    loop {
        let state = next_state(&mut states).await;
        if state.data.as_deref() == Some(&json!({ "v": 3 })) {
            break;
        }
        assert_ne!(
            state.data.as_deref(),
            Some(&json!({ "v": 2 })),
            "superseded refetch must not be applied"
        );
    }

    let final_state = mutations.state("M1").unwrap();
    assert!(!final_state.running);
    assert!(final_state.finished);
    assert_eq!(transport.query_count(), 3);
}

#[tokio::test]
async fn error_settlement_is_recoverable() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (options, mut states) = recording_options();

    let manager = runtime
        .query(QueryPacket::new("Q1"), options.build())
        .unwrap();
    manager.load();
    transport.next_call().await.reject("connection refused");
    next_state(&mut states).await; // loading
    let errored = next_state(&mut states).await;
    assert!(errored.loaded);
    assert!(errored.error.is_some());
    assert!(errored.data.is_none());

    // A later load() retries instead of replaying the cached failure.
    manager.load();
    let retry = transport.next_call().await;
    retry.resolve(json!({ "x": 1 }));
    loop {
        let state = next_state(&mut states).await;
        if state.data.is_some() {
            assert!(state.error.is_none());
            break;
        }
    }
    assert_eq!(transport.query_count(), 2);
}

#[tokio::test]
async fn map_state_transforms_before_observation() {
    let transport = ManualTransport::new();
    let runtime = runtime_with(&transport);
    let (tx, mut states) = mpsc::unbounded_channel();

    let manager = runtime
        .query(
            QueryPacket::new("Q1"),
            QueryOptions::builder()
                .map_state(|mut state: QueryState| {
                    state.data = state.data.map(|_| Arc::new(json!({ "mapped": true })));
                    state
                })
                .observer(move |state| {
                    let _ = tx.send(state);
                })
                .build(),
        )
        .unwrap();
    manager.load();
    transport.next_call().await.resolve(json!({ "x": 1 }));

    loop {
        let state: QueryState = tokio::time::timeout(Duration::from_secs(5), states.recv())
            .await
            .unwrap()
            .unwrap();
        if state.loaded {
            assert_eq!(state.data.as_deref(), Some(&json!({ "mapped": true })));
            break;
        }
    }
    // The mapping is presentation-only; owned state is untouched.
    assert_eq!(manager.state().data.as_deref(), Some(&json!({ "x": 1 })));
}
