// ── Connectivity event bus ──
//
// Process-wide dispatch point. Producers publish from their own execution
// contexts; handlers run synchronously on the publishing context, in
// registration order. The subscription list is an immutable snapshot
// swapped atomically, so no lock is held while handlers run and a handler
// may publish again without deadlocking.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{error, trace};

use crate::model::{ConnectivityEvent, EventClass};

/// Handler invoked for every event of the class it subscribed to.
pub type EventHandler = Arc<dyn Fn(&ConnectivityEvent) + Send + Sync>;

/// Token returned by [`EventBus::register`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    class: EventClass,
    handler: EventHandler,
}

/// Synchronous, reentrant-safe fan-out of connectivity events.
pub struct EventBus {
    subscriptions: ArcSwap<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `handler` to every event of `class`.
    pub fn register<F>(&self, class: EventClass, handler: F) -> SubscriptionId
    where
        F: Fn(&ConnectivityEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription {
            id,
            class,
            handler: Arc::new(handler),
        });

        self.subscriptions.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&subscription));
            next
        });
        trace!(?id, %class, "handler registered");
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let previous = self.subscriptions.rcu(|current| {
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|s| s.id == id)
    }

    /// Deliver `event` to every handler registered for its class.
    ///
    /// Handlers run in registration order on the caller's context. A
    /// handler that panics is isolated: the panic is logged and the
    /// remaining handlers still run. With no subscribers the event is
    /// dropped. Returns the number of handlers that completed.
    pub fn publish(&self, event: &ConnectivityEvent) -> usize {
        let class = event.class();
        let snapshot = self.subscriptions.load_full();
        let mut delivered = 0;

        for subscription in snapshot.iter().filter(|s| s.class == class) {
            let handler = &subscription.handler;
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    subscription = ?subscription.id,
                    event = event.name(),
                    "event handler panicked"
                ),
            }
        }

        if delivered == 0 {
            trace!(event = event.name(), "event dropped: no handler completed");
        }
        delivered
    }

    pub fn handler_count(&self, class: EventClass) -> usize {
        self.subscriptions
            .load()
            .iter()
            .filter(|s| s.class == class)
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
