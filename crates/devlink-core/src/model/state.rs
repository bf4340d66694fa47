// ── Lifecycle state and user-facing indicator ──

use std::fmt;

use serde::Serialize;
use strum::Display;

/// Where the device is in its network lifecycle.
///
/// Owned exclusively by the Coordinator; every downstream command is
/// derived from a transition of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceConnectivityState {
    Unprovisioned,
    Provisioning,
    ConnectingToNetwork,
    Connected,
    Reconnecting,
    /// Retries exhausted. Left only through a factory reset.
    ConnectionAbandoned,
}

impl DeviceConnectivityState {
    /// States in which an acquired IP address completes the connection.
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::ConnectingToNetwork | Self::Reconnecting)
    }
}

/// Status LED pattern, the only user-visible signal the device has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorPattern {
    Off,
    On,
    Blink { interval_ms: u32 },
}

impl IndicatorPattern {
    /// Fast blink while a provisioning transport is active.
    pub const PROVISIONING: Self = Self::Blink { interval_ms: 100 };
    /// Slow blink while searching for (or reconnecting to) the network.
    pub const SEARCHING: Self = Self::Blink { interval_ms: 250 };
    /// Long blink once provisioning failed or retries are exhausted.
    pub const ERROR: Self = Self::Blink { interval_ms: 1500 };
}

impl fmt::Display for IndicatorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
            Self::Blink { interval_ms } => write!(f, "blink({interval_ms}ms)"),
        }
    }
}
