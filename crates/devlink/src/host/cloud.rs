// ── Host cloud client and OTA tasks ──
//
// Both run as spawned tasks in a `TaskSlot`. The cloud task owns an inbox
// of inbound traffic (messages, method calls) and outbound reported-state
// updates; the OTA task checks once and exits.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use devlink_core::{
    CloudCallbacks, CloudService, ContentType, OtaService, ReportCallback, ReportStatus,
    ServiceError, TaskSlot,
};

/// Status reported when an update never reached the cloud.
const UNDELIVERED: ReportStatus = ReportStatus(503);
const ACCEPTED: ReportStatus = ReportStatus(204);

/// Simulated duration of an update check.
const OTA_CHECK: Duration = Duration::from_millis(200);

enum Inbox {
    Message {
        content_type: ContentType,
        payload: Vec<u8>,
    },
    Method {
        name: String,
        payload: Vec<u8>,
    },
    Report {
        payload: Value,
        on_complete: ReportCallback,
    },
}

// ── Cloud client ─────────────────────────────────────────────────────

pub struct HostCloud {
    slot: TaskSlot,
    callbacks: Arc<dyn CloudCallbacks>,
    inbox: Mutex<Option<mpsc::UnboundedSender<Inbox>>>,
}

impl HostCloud {
    pub fn new(runtime: Handle, callbacks: Arc<dyn CloudCallbacks>) -> Self {
        Self {
            slot: TaskSlot::new("cloud", runtime),
            callbacks,
            inbox: Mutex::new(None),
        }
    }

    /// Deliver a cloud-to-device message. `false` when the client is down.
    pub fn deliver_message(&self, content_type: ContentType, payload: Vec<u8>) -> bool {
        self.post(Inbox::Message {
            content_type,
            payload,
        })
        .is_ok()
    }

    /// Invoke a direct method. `false` when the client is down.
    pub fn invoke_method(&self, name: String, payload: Vec<u8>) -> bool {
        self.post(Inbox::Method { name, payload }).is_ok()
    }

    fn post(&self, item: Inbox) -> Result<(), Inbox> {
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        match inbox.as_ref() {
            Some(tx) if self.slot.is_running() => tx.send(item).map_err(|e| e.0),
            _ => Err(item),
        }
    }
}

impl CloudService for HostCloud {
    fn start(&self) -> Result<(), ServiceError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = Arc::clone(&self.callbacks);

        let started = self.slot.start(move |cancel| async move {
            info!("cloud client connected");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        fail_pending(&mut rx);
                        break;
                    }
                    item = rx.recv() => match item {
                        None => break,
                        Some(Inbox::Message { content_type, payload }) => {
                            callbacks.on_message(content_type, &payload);
                        }
                        Some(Inbox::Method { name, payload }) => {
                            let response = callbacks.on_method_invoked(&name, &payload);
                            debug!(method = %name, payload = %response.payload, "method response sent");
                        }
                        Some(Inbox::Report { payload, on_complete }) => {
                            debug!(%payload, "reported state sent");
                            on_complete(ACCEPTED);
                        }
                    },
                }
            }
            info!("cloud client disconnected");
        });

        if started {
            *self.inbox.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        }
        Ok(())
    }

    fn stop(&self) {
        self.slot.stop();
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    fn send_reported_state(&self, payload: Value, on_complete: ReportCallback) {
        if let Err(Inbox::Report { on_complete, .. }) = self.post(Inbox::Report {
            payload,
            on_complete,
        }) {
            warn!("cloud client not running; reported state dropped");
            on_complete(UNDELIVERED);
        }
    }
}

/// Close the inbox and complete every queued report as undelivered.
/// Inbound traffic still queued is dropped with the connection.
fn fail_pending(rx: &mut mpsc::UnboundedReceiver<Inbox>) {
    rx.close();
    let mut dropped = 0usize;
    while let Ok(item) = rx.try_recv() {
        match item {
            Inbox::Report { on_complete, .. } => on_complete(UNDELIVERED),
            Inbox::Message { .. } | Inbox::Method { .. } => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(dropped, "cloud traffic discarded on disconnect");
    }
}

// ── OTA ──────────────────────────────────────────────────────────────

pub struct HostOta {
    slot: TaskSlot,
}

impl HostOta {
    pub fn new(runtime: Handle) -> Self {
        Self {
            slot: TaskSlot::new("ota", runtime),
        }
    }
}

impl OtaService for HostOta {
    fn start(&self, update_url: &Url) -> Result<(), ServiceError> {
        let url = update_url.clone();
        let started = self.slot.start(move |cancel| async move {
            info!(%url, "checking for firmware update");
            tokio::select! {
                () = cancel.cancelled() => debug!("firmware update check cancelled"),
                () = tokio::time::sleep(OTA_CHECK) => info!("firmware is up to date"),
            }
        });
        if !started {
            debug!("firmware update check already in progress");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use devlink_core::DeviceCloudHandler;
    use tokio::sync::oneshot;

    use super::*;

    fn cloud() -> HostCloud {
        HostCloud::new(Handle::current(), Arc::new(DeviceCloudHandler))
    }

    fn completion() -> (ReportCallback, oneshot::Receiver<ReportStatus>) {
        let (tx, rx) = oneshot::channel();
        let callback: ReportCallback = Box::new(move |status| {
            let _ = tx.send(status);
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn report_is_acknowledged_while_running() {
        let cloud = cloud();
        cloud.start().unwrap();
        assert!(cloud.is_running());

        let (callback, rx) = completion();
        cloud.send_reported_state(serde_json::json!({ "uptime_secs": 1 }), callback);
        assert_eq!(rx.await.unwrap(), ACCEPTED);
        cloud.stop();
    }

    #[tokio::test]
    async fn stopped_client_fails_reports_and_drops_traffic() {
        let cloud = cloud();
        cloud.stop();
        cloud.stop();

        let (callback, rx) = completion();
        cloud.send_reported_state(serde_json::json!({}), callback);
        assert_eq!(rx.await.unwrap(), UNDELIVERED);
        assert!(!cloud.deliver_message(ContentType::Text, b"hello".to_vec()));
        assert!(!cloud.invoke_method("reboot".into(), b"{}".to_vec()));
    }

    #[tokio::test]
    async fn report_queued_before_stop_still_completes() {
        for _ in 0..50 {
            let cloud = cloud();
            cloud.start().unwrap();

            let (callback, rx) = completion();
            cloud.send_reported_state(serde_json::json!({ "uptime_secs": 2 }), callback);
            cloud.stop();

            let status = tokio::time::timeout(Duration::from_secs(1), rx)
                .await
                .expect("completion callback not invoked")
                .unwrap();
            assert!(status == ACCEPTED || status == UNDELIVERED, "{status:?}");
        }
    }

    #[tokio::test]
    async fn restart_after_stop_accepts_traffic_again() {
        let cloud = cloud();
        cloud.start().unwrap();
        cloud.stop();
        cloud.start().unwrap();
        assert!(cloud.deliver_message(ContentType::Binary, vec![0xde, 0xad]));
        cloud.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn ota_check_terminates_on_its_own() {
        let ota = HostOta::new(Handle::current());
        let url = Url::parse("https://fw.example.com/device.bin").unwrap();
        ota.start(&url).unwrap();
        assert!(ota.slot.is_running());

        tokio::time::sleep(OTA_CHECK * 2).await;
        tokio::task::yield_now().await;
        assert!(!ota.slot.is_running());
    }
}
