// ── Restartable background task slot ──
//
// Fire-and-forget task handle with an idempotent stop. Collaborators that
// run as spawned tasks (cloud client, OTA) keep one slot each.

use std::future::Future;
use std::sync::Mutex;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// At most one running instance of a named background task.
pub struct TaskSlot {
    name: &'static str,
    runtime: Handle,
    current: Mutex<Option<Running>>,
}

impl TaskSlot {
    /// Create a slot that spawns onto `runtime`.
    ///
    /// The runtime is captured up front so `start` works from any thread,
    /// including bus handlers running outside a runtime context.
    pub fn new(name: &'static str, runtime: Handle) -> Self {
        Self {
            name,
            runtime,
            current: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Spawn the task unless an instance is still running.
    ///
    /// The closure receives a token that is cancelled by [`stop`](Self::stop).
    /// Returns `false` when an instance was already running.
    pub fn start<F, Fut>(&self, task: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!(task = self.name, "already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = self.runtime.spawn(task(cancel.clone()));
        *current = Some(Running { cancel, handle });
        debug!(task = self.name, "task started");
        true
    }

    /// Cancel the running instance, if any. Stopping a stopped slot is a no-op.
    ///
    /// Returns `true` when a live instance was cancelled.
    pub fn stop(&self) -> bool {
        let Some(running) = self.lock().take() else {
            return false;
        };
        let was_live = !running.handle.is_finished();
        running.cancel.cancel();
        if was_live {
            debug!(task = self.name, "task stopped");
        }
        was_live
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.current.lock().unwrap_or_else(|poisoned| {
            warn!(task = self.name, "task slot lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(running) = self.lock().take() {
            running.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn stop_is_idempotent() {
        let slot = TaskSlot::new("cloud", Handle::current());
        assert!(!slot.stop());

        assert!(slot.start(|cancel| async move { cancel.cancelled().await }));
        assert!(slot.is_running());

        assert!(slot.stop());
        assert!(!slot.stop());
        assert!(!slot.stop());
    }

    #[tokio::test]
    async fn start_refuses_second_live_instance() {
        let slot = TaskSlot::new("cloud", Handle::current());
        assert!(slot.start(|cancel| async move { cancel.cancelled().await }));
        assert!(!slot.start(|cancel| async move { cancel.cancelled().await }));
        slot.stop();
    }

    #[tokio::test]
    async fn finished_task_can_be_restarted() {
        let slot = TaskSlot::new("ota", Handle::current());
        assert!(slot.start(|_| async {}));

        for _ in 0..100 {
            if !slot.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(!slot.is_running());
        assert!(slot.start(|_| async {}));
    }
}
