// devlink-core: Connectivity bring-up and device lifecycle coordination.

pub mod bus;
pub mod cloud;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod provisioning;
pub mod retry;
pub mod service;
pub mod store;
pub mod task;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use cloud::{
    CloudCallbacks, ContentType, DeviceCloudHandler, MethodResponse, ReportCallback, ReportStatus,
    log_report_completion,
};
pub use config::{
    CoordinatorConfig, DEFAULT_BLE_SERVICE_UUID, ProvisioningConfig, SecurityLevel, TransportKind,
};
pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorSnapshot, Transition};
pub use error::{CoreError, ServiceError};
pub use provisioning::{
    Provisioner, ProvisioningPhase, ProvisioningSession, ProvisioningStep, service_name,
};
pub use retry::{RetryCeiling, should_retry};
pub use service::{CloudService, Indicator, OtaService, ProvisioningTransport, RadioDriver, Services};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use task::TaskSlot;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConnectivityEvent, DeviceConnectivityState, DisconnectReason, EventClass, HardwareAddress,
    IndicatorPattern, ParseHardwareAddressError, ProvisioningFailure, WifiCredentials,
};
