//! The mutation coordinator: owns named mutations and broadcasts completion.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::bus::MutationBus;
use crate::error::{CoreError, Result};
use crate::options::{MutationOptions, MutationPacket};
use crate::runtime::GraphRuntime;
use crate::state::{MutationObserver, MutationState};
use crate::transport::{GraphRequest, SharedTransport};

/// Coordinates the named mutations of one packet, each tracking an
/// independent [`MutationState`], and broadcasts invalidation on the bus
/// when one completes.
///
/// Overlapping invocations of the same name are allowed: every call issues a
/// transport request and resets `finished`; each settlement broadcasts
/// independently, so `finished` ultimately reflects the last settlement.
/// Local state always settles before the broadcast goes out, so the invoking
/// side observes its own completion no later than dependents start
/// refetching. Failed settlements record their error locally and, by
/// default, do not broadcast (see
/// [`MutationOptions::broadcast_on_error`](crate::MutationOptions)).
pub struct MutationManager {
    inner: Arc<MutationInner>,
}

impl std::fmt::Debug for MutationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationManager").finish_non_exhaustive()
    }
}

struct MutationEntry {
    name: String,
    document: String,
    state: Mutex<MutationState>,
}

struct MutationInner {
    client: SharedTransport,
    bus: MutationBus,
    broadcast_on_error: bool,
    observer: Option<MutationObserver>,
    entries: Vec<MutationEntry>,
}

impl MutationManager {
    pub(crate) fn new(
        runtime: &GraphRuntime,
        packet: MutationPacket,
        options: MutationOptions,
    ) -> Result<Self> {
        packet.validate()?;
        let MutationOptions {
            client,
            broadcast_on_error,
            observer,
        } = options;

        let client = client
            .or_else(|| runtime.registry().default_client())
            .ok_or(CoreError::NoClient)?;

        let entries = packet
            .entries()
            .iter()
            .map(|(name, document)| MutationEntry {
                name: name.clone(),
                document: document.clone(),
                state: Mutex::new(MutationState::default()),
            })
            .collect();

        Ok(Self {
            inner: Arc::new(MutationInner {
                client,
                bus: runtime.bus().clone(),
                broadcast_on_error,
                observer,
                entries,
            }),
        })
    }

    /// Snapshot of one named mutation's state.
    pub fn state(&self, name: &str) -> Option<MutationState> {
        self.inner
            .entry(name)
            .map(|(_, entry)| entry.state.lock().clone())
    }

    /// Declared names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Invoke a named mutation.
    ///
    /// Resets the name's state to `{running: true, finished: false}`, issues
    /// the request, and on settlement records `{running: false, finished:
    /// true}` plus any error, notifies the observer, and then broadcasts the
    /// name on the bus (success only, unless `broadcast_on_error` is set).
    /// Fails immediately if the packet never declared `name`.
    pub fn run_mutation(&self, name: &str, variables: Option<Value>) -> Result<()> {
        let (index, entry) = self
            .inner
            .entry(name)
            .ok_or_else(|| CoreError::UnknownMutation(name.to_string()))?;

        {
            let mut state = entry.state.lock();
            state.running = true;
            state.finished = false;
            state.error = None;
        }
        debug!(mutation = %name, "running mutation");

        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(async move {
            let entry = &inner.entries[index];
            let running = entry.state.lock().clone();
            inner.notify(&entry.name, running);

            let mut request = GraphRequest::new(entry.document.clone());
            if let Some(variables) = variables {
                request = request.with_variables(variables);
            }
            let result = inner.client.mutate(&request).await;

            let (snapshot, broadcast) = {
                let mut state = entry.state.lock();
                state.running = false;
                state.finished = true;
                match &result {
                    Ok(_) => {
                        state.error = None;
                        (state.clone(), true)
                    }
                    Err(error) => {
                        state.error = Some(error.clone());
                        (state.clone(), inner.broadcast_on_error)
                    }
                }
            };
            inner.notify(&entry.name, snapshot);

            if broadcast {
                inner.bus.publish(&entry.name);
            } else {
                debug!(mutation = %entry.name, "mutation failed, skipping broadcast");
            }
        });

        Ok(())
    }
}

impl MutationInner {
    fn entry(&self, name: &str) -> Option<(usize, &MutationEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name)
    }

    fn notify(&self, name: &str, state: MutationState) {
        if let Some(observer) = &self.observer {
            observer(name, state);
        }
    }
}
