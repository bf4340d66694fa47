// ── Downstream collaborators ──
//
// The narrow command surface the Coordinator drives. Every call is
// fire-and-forget: results come back as events on the bus, never as
// return values the Coordinator waits on.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::cloud::ReportCallback;
use crate::error::ServiceError;
use crate::model::{HardwareAddress, IndicatorPattern, WifiCredentials};
use crate::provisioning::ProvisioningSession;
use crate::store::CredentialStore;

/// Station side of the radio driver.
pub trait RadioDriver: Send + Sync {
    fn hardware_address(&self) -> HardwareAddress;

    /// Enter station mode. `None` reuses whatever the driver already holds.
    /// Completion arrives as `LinkStarted`.
    fn start_station(&self, credentials: Option<&WifiCredentials>) -> Result<(), ServiceError>;

    /// Request association. Completion arrives as `IpAcquired` or
    /// `LinkDisconnected`; reconnect pacing belongs to the driver.
    fn connect(&self) -> Result<(), ServiceError>;
}

/// Soft-AP or short-range radio channel for receiving credentials.
pub trait ProvisioningTransport: Send + Sync {
    fn activate(&self, session: &ProvisioningSession) -> Result<(), ServiceError>;

    /// Release transport resources. Idempotent.
    fn deactivate(&self);
}

/// Cloud client task.
pub trait CloudService: Send + Sync {
    fn start(&self) -> Result<(), ServiceError>;

    /// Stop the task. Stopping an already-stopped task is a no-op.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Queue a reported-state update; `on_complete` fires once with the status.
    fn send_reported_state(&self, payload: Value, on_complete: ReportCallback);
}

/// Firmware update task. Self-terminating on completion or failure.
pub trait OtaService: Send + Sync {
    fn start(&self, update_url: &Url) -> Result<(), ServiceError>;
}

/// Status LED driver.
pub trait Indicator: Send + Sync {
    fn set_pattern(&self, pattern: IndicatorPattern);
}

/// Handles to every collaborator the Coordinator commands.
#[derive(Clone)]
pub struct Services {
    pub radio: Arc<dyn RadioDriver>,
    pub transport: Arc<dyn ProvisioningTransport>,
    pub cloud: Arc<dyn CloudService>,
    pub ota: Arc<dyn OtaService>,
    pub indicator: Arc<dyn Indicator>,
    pub store: Arc<dyn CredentialStore>,
}
