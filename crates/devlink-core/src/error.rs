// ── Core error types ──
//
// Every failure the connectivity layer can observe. Producers never
// raise these across the bus; they publish typed events and the
// Coordinator decides which of these an event amounts to.

use thiserror::Error;

use crate::model::ProvisioningFailure;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Startup errors ───────────────────────────────────────────────
    /// Fatal: the device cannot proceed without its transport.
    #[error("Failed to activate {transport} transport: {reason}")]
    TransportActivation { transport: String, reason: String },

    // ── Provisioning errors ──────────────────────────────────────────
    #[error("Provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningFailure),

    // ── Connectivity errors ──────────────────────────────────────────
    #[error("Connection abandoned after {attempts} consecutive retries")]
    RetriesExhausted { attempts: u32 },

    #[error("Device is not connected")]
    NotConnected,

    #[error("Event `{event}` rejected in state {state}")]
    InvalidTransition { state: String, event: &'static str },

    // ── Downstream service errors ────────────────────────────────────
    #[error("Failed to start {service}: {reason}")]
    DownstreamStart { service: &'static str, reason: String },

    #[error("Reported state delivery failed with status {status}")]
    ReportDelivery { status: u16 },

    // ── Persistence / configuration ──────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether the device must halt (or reboot) when this surfaces at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportActivation { .. } | Self::Storage { .. } | Self::Config { .. }
        )
    }
}

/// Failure reported by a downstream collaborator (radio, cloud, OTA,
/// provisioning transport).
#[derive(Debug, Error)]
#[error("{service}: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for CoreError {
    fn from(err: ServiceError) -> Self {
        CoreError::DownstreamStart {
            service: err.service,
            reason: err.message,
        }
    }
}
