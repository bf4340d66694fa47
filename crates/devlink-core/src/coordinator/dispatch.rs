// ── Serialized dispatch into the Coordinator ──
//
// Producers publish from independent contexts, and a handler may publish
// again while the Coordinator is mid-transition. Inputs are queued and
// drained by whichever caller currently owns the Coordinator, so every
// mutation happens one at a time and no caller ever waits on a lock
// held further up its own stack.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use serde_json::Value;
use strum::IntoEnumIterator;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::{Coordinator, CoordinatorSnapshot, forward_report};
use crate::bus::{EventBus, SubscriptionId};
use crate::cloud::ReportCallback;
use crate::error::CoreError;
use crate::model::{ConnectivityEvent, DeviceConnectivityState, EventClass};
use crate::service::CloudService;

enum Input {
    Event(ConnectivityEvent),
    FactoryReset,
}

/// Shareable, serialized front for a [`Coordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    coordinator: Mutex<Coordinator>,
    pending: Mutex<VecDeque<Input>>,
    snapshot: watch::Receiver<CoordinatorSnapshot>,
    cloud: Arc<dyn CloudService>,
}

impl CoordinatorHandle {
    pub fn new(coordinator: Coordinator) -> Self {
        let snapshot = coordinator.subscribe();
        let cloud = coordinator.services.cloud.clone();
        Self {
            inner: Arc::new(HandleInner {
                coordinator: Mutex::new(coordinator),
                pending: Mutex::new(VecDeque::new()),
                snapshot,
                cloud,
            }),
        }
    }

    /// Subscribe the Coordinator to every event class on `bus`.
    pub fn attach(&self, bus: &EventBus) -> Vec<SubscriptionId> {
        EventClass::iter()
            .map(|class| {
                let handle = self.clone();
                bus.register(class, move |event| handle.submit(event.clone()))
            })
            .collect()
    }

    /// Run the Coordinator's boot step.
    ///
    /// Blocks until the Coordinator is free, so it must not be called from
    /// a bus handler.
    pub fn start(&self) -> Result<DeviceConnectivityState, CoreError> {
        let result = self.lock_coordinator().start();
        self.drain();
        result
    }

    /// Queue one event and process the queue if nobody else is.
    pub fn submit(&self, event: ConnectivityEvent) {
        self.enqueue(Input::Event(event));
    }

    /// Queue a factory reset behind any events already submitted.
    pub fn factory_reset(&self) {
        self.enqueue(Input::FactoryReset);
    }

    /// Forward a reported-state update to the cloud client.
    ///
    /// Reads the published snapshot only, so it is safe from any context
    /// including the cloud task itself.
    pub fn send_reported_state(
        &self,
        payload: Value,
        on_complete: ReportCallback,
    ) -> Result<(), CoreError> {
        let state = self.inner.snapshot.borrow().state;
        forward_report(state, self.inner.cloud.as_ref(), payload, on_complete)
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        *self.inner.snapshot.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.inner.snapshot.clone()
    }

    fn enqueue(&self, input: Input) {
        self.pending().push_back(input);
        self.drain();
    }

    fn drain(&self) {
        loop {
            let mut coordinator = match self.inner.coordinator.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!("coordinator lock poisoned; recovering");
                    poisoned.into_inner()
                }
                // The current owner drains what we queued.
                Err(TryLockError::WouldBlock) => return,
            };

            loop {
                let next = self.pending().pop_front();
                let Some(input) = next else { break };
                apply(&mut coordinator, input);
            }
            drop(coordinator);

            // Inputs queued between the last pop and the unlock.
            if self.pending().is_empty() {
                return;
            }
        }
    }

    fn lock_coordinator(&self) -> MutexGuard<'_, Coordinator> {
        self.inner
            .coordinator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<Input>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply(coordinator: &mut Coordinator, input: Input) {
    match input {
        Input::Event(event) => match coordinator.handle(&event) {
            Ok(transition) => debug!(
                from = %transition.from,
                to = %transition.to,
                event = event.name(),
                "event applied"
            ),
            Err(e @ CoreError::InvalidTransition { .. }) => warn!(error = %e, "event rejected"),
            Err(e) => error!(error = %e, event = event.name(), "event handling failed"),
        },
        Input::FactoryReset => {
            if let Err(e) = coordinator.factory_reset() {
                error!(error = %e, "factory reset failed");
            }
        }
    }
}
