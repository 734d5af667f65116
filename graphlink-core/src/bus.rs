//! Pub/sub bus carrying mutation-completion invalidations to queries.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Receiver side of a bus subscription.
///
/// Implementations must tolerate being invoked after they have started
/// tearing down; a disposed [`QueryManager`](crate::QueryManager) treats the
/// call as a no-op.
pub trait InvalidationSubscriber: Send + Sync {
    /// A mutation this subscriber registered for has completed.
    fn on_invalidate(&self);
}

/// Opaque handle identifying one subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

struct Registration {
    token: SubscriptionToken,
    subscriber: Weak<dyn InvalidationSubscriber>,
}

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<String, Vec<Registration>>,
    tokens: u64,
}

/// Registry mapping a mutation identity to the ordered set of subscribers
/// awaiting invalidation notice.
///
/// Notification order is registration order. [`publish`](Self::publish)
/// iterates a snapshot taken under the lock, so a subscriber unsubscribing
/// from within its own callback (disposal during notification) neither skips
/// nor double-notifies its siblings. Cloning shares the underlying registry.
#[derive(Clone, Default)]
pub struct MutationBus {
    inner: Arc<Mutex<BusInner>>,
}

impl MutationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a mutation identity.
    ///
    /// The bus holds only a weak handle; dropping the subscriber without
    /// unsubscribing leaves a dead registration that is pruned on the next
    /// publish, but callers should still unsubscribe on disposal.
    pub fn subscribe(
        &self,
        mutation: impl Into<String>,
        subscriber: Weak<dyn InvalidationSubscriber>,
    ) -> SubscriptionToken {
        let mutation = mutation.into();
        let mut inner = self.inner.lock();
        inner.tokens += 1;
        let token = SubscriptionToken(inner.tokens);
        debug!(mutation = %mutation, token = token.0, "subscribing to mutation");
        inner
            .subscribers
            .entry(mutation)
            .or_default()
            .push(Registration { token, subscriber });
        token
    }

    /// Remove one subscription.
    pub fn unsubscribe(&self, mutation: &str, token: SubscriptionToken) {
        let mut inner = self.inner.lock();
        if let Some(registrations) = inner.subscribers.get_mut(mutation) {
            registrations.retain(|r| r.token != token);
            if registrations.is_empty() {
                inner.subscribers.remove(mutation);
            }
            debug!(mutation = %mutation, token = token.0, "unsubscribed from mutation");
        }
    }

    /// Notify every subscriber currently registered for a mutation identity.
    ///
    /// Dead weak handles are pruned here; live ones are called in
    /// registration order on the publisher's stack, though each subscriber's
    /// resulting refetch is asynchronous.
    pub fn publish(&self, mutation: &str) {
        let snapshot: Vec<Arc<dyn InvalidationSubscriber>> = {
            let mut inner = self.inner.lock();
            match inner.subscribers.get_mut(mutation) {
                Some(registrations) => {
                    registrations.retain(|r| r.subscriber.strong_count() > 0);
                    registrations
                        .iter()
                        .filter_map(|r| r.subscriber.upgrade())
                        .collect()
                }
                None => {
                    debug!(mutation = %mutation, "published mutation has no subscribers");
                    return;
                }
            }
        };

        debug!(mutation = %mutation, count = snapshot.len(), "publishing invalidation");
        for subscriber in snapshot {
            subscriber.on_invalidate();
        }
    }

    /// Number of live subscriptions for a mutation identity.
    pub fn subscriber_count(&self, mutation: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(mutation)
            .map(|registrations| {
                registrations
                    .iter()
                    .filter(|r| r.subscriber.strong_count() > 0)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop every subscription. Intended for test teardown.
    pub fn clear(&self) {
        self.inner.lock().subscribers.clear();
        debug!("mutation bus cleared");
    }
}
