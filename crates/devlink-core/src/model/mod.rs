// ── Domain model ──
//
// Events, lifecycle state, and the identity/credential types the
// connectivity layer passes between producers and collaborators.

pub mod credentials;
pub mod event;
pub mod hardware;
pub mod state;

pub use credentials::WifiCredentials;
pub use event::{ConnectivityEvent, DisconnectReason, EventClass, ProvisioningFailure};
pub use hardware::{HardwareAddress, ParseHardwareAddressError};
pub use state::{DeviceConnectivityState, IndicatorPattern};
