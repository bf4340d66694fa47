// ── Cloud client callback contract ──
//
// The cloud client is an opaque collaborator. It calls back into the
// device for inbound messages and direct method invocations, and reports
// completion of reported-state updates asynchronously.

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::CoreError;

/// Encoding of an inbound cloud-to-device message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
    Text,
    Binary,
}

/// Reply to a direct method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResponse {
    pub status: u16,
    pub payload: Value,
}

/// Status code delivered when a reported-state update completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStatus(pub u16);

impl ReportStatus {
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

/// Invoked exactly once when a reported-state update completes.
pub type ReportCallback = Box<dyn FnOnce(ReportStatus) + Send + 'static>;

/// Callbacks the cloud client invokes on the device.
pub trait CloudCallbacks: Send + Sync {
    fn on_message(&self, content_type: ContentType, payload: &[u8]);

    fn on_method_invoked(&self, name: &str, payload: &[u8]) -> MethodResponse;
}

/// Default device-side handler: logs traffic and acknowledges methods.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceCloudHandler;

impl CloudCallbacks for DeviceCloudHandler {
    fn on_message(&self, content_type: ContentType, payload: &[u8]) {
        match content_type {
            ContentType::Text => match std::str::from_utf8(payload) {
                Ok(text) => info!(%content_type, body = text, "cloud message received"),
                Err(_) => warn!(%content_type, len = payload.len(), "text message is not UTF-8"),
            },
            ContentType::Binary => info!(
                %content_type,
                len = payload.len(),
                body = %String::from_utf8_lossy(payload),
                "cloud message received"
            ),
        }
    }

    fn on_method_invoked(&self, name: &str, payload: &[u8]) -> MethodResponse {
        info!(
            method = name,
            payload = %String::from_utf8_lossy(payload),
            "direct method invoked"
        );
        let response = MethodResponse {
            status: 200,
            payload: json!({ "success": "true" }),
        };
        info!(method = name, status = response.status, "sending method response");
        response
    }
}

/// Completion callback that only logs the outcome.
///
/// Failures are not retried here; the producer re-sends on its own schedule.
pub fn log_report_completion(label: &'static str) -> ReportCallback {
    Box::new(move |status: ReportStatus| {
        if status.is_success() {
            info!(report = label, status = status.0, "reported state acknowledged");
        } else {
            let err = CoreError::ReportDelivery { status: status.0 };
            warn!(report = label, error = %err, "reported state not delivered");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_invocation_is_acknowledged() {
        let response = DeviceCloudHandler.on_method_invoked("reboot", br#"{"delay":5}"#);
        assert_eq!(response.status, 200);
        assert_eq!(response.payload, json!({ "success": "true" }));
    }

    #[test]
    fn report_status_success_range() {
        assert!(ReportStatus(200).is_success());
        assert!(ReportStatus(204).is_success());
        assert!(!ReportStatus(400).is_success());
        assert!(!ReportStatus(503).is_success());
    }

    #[test]
    fn completion_logger_accepts_any_status() {
        log_report_completion("test")(ReportStatus(500));
        log_report_completion("test")(ReportStatus(204));
    }
}
