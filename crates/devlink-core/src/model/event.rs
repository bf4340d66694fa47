// ── Connectivity events ──
//
// Published by independent producers (radio driver, IP stack,
// provisioning transport) and consumed exactly once by the Coordinator.

use std::fmt;
use std::net::Ipv4Addr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;

/// Producer class of an event. Bus subscriptions are made per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    /// Radio link events (station started, disconnected).
    Link,
    /// IP stack events (address acquired).
    Ip,
    /// Provisioning-protocol events.
    Provisioning,
}

/// Disconnect reason code as reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectReason(pub u16);

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the provisioning transport could not use the received credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningFailure {
    #[error("Wi-Fi station authentication failed")]
    AuthenticationError,
    #[error("Wi-Fi access point not found")]
    AccessPointNotFound,
}

/// A typed event from one of the connectivity producers.
///
/// Immutable once constructed. The variant name (`snake_case`) is
/// available through `<&'static str>::from(&event)` for logging.
#[derive(Debug, Clone, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectivityEvent {
    LinkStarted,
    LinkDisconnected { reason: DisconnectReason },
    IpAcquired { address: Ipv4Addr },
    ProvisioningStarted,
    CredentialsReceived { ssid: String, secret: SecretString },
    ProvisioningFailed { cause: ProvisioningFailure },
    ProvisioningSucceeded,
    ProvisioningEnded,
}

impl ConnectivityEvent {
    pub fn class(&self) -> EventClass {
        match self {
            Self::LinkStarted | Self::LinkDisconnected { .. } => EventClass::Link,
            Self::IpAcquired { .. } => EventClass::Ip,
            Self::ProvisioningStarted
            | Self::CredentialsReceived { .. }
            | Self::ProvisioningFailed { .. }
            | Self::ProvisioningSucceeded
            | Self::ProvisioningEnded => EventClass::Provisioning,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}
