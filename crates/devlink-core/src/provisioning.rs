// ── Provisioning state machine ──
//
// Idle → Provisioning → {Succeeded, Failed} → Ended
//
// Tracks whether the device holds credentials and, if not, drives the
// configured transport until credentials arrive. `Failed` never retries on
// its own: only `reset()` (factory reset) starts the flow again.

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ProvisioningConfig, SecurityLevel, TransportKind};
use crate::error::CoreError;
use crate::model::{ConnectivityEvent, HardwareAddress, ProvisioningFailure, WifiCredentials};
use crate::service::ProvisioningTransport;
use crate::store::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningPhase {
    Idle,
    Provisioning,
    Succeeded,
    Failed,
    Ended,
}

/// Parameters handed to the transport on activation.
#[derive(Debug, Clone)]
pub struct ProvisioningSession {
    pub transport: TransportKind,
    pub security: SecurityLevel,
    /// Soft-AP SSID or BLE device name.
    pub service_name: String,
    /// Soft-AP password; always `None` for the short-range radio.
    pub service_key: Option<SecretString>,
    /// Present only for authenticated security.
    pub proof_of_possession: Option<SecretString>,
    /// Advertised GATT service; short-range radio only.
    pub service_uuid: Option<Uuid>,
}

/// What a handled provisioning event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    /// Logged only.
    Noted,
    CredentialsReceived,
    Failed(ProvisioningFailure),
    Succeeded,
    Ended,
}

/// Device/service name: prefix followed by the last three octets of the
/// radio address in uppercase hex, e.g. `PROV_A1B2C3`.
pub fn service_name(prefix: &str, address: &HardwareAddress) -> String {
    format!("{prefix}{}", address.suffix_hex())
}

pub struct Provisioner {
    config: ProvisioningConfig,
    transport: Arc<dyn ProvisioningTransport>,
    store: Arc<dyn CredentialStore>,
    phase: ProvisioningPhase,
    transport_active: bool,
    received: Option<WifiCredentials>,
    failure: Option<ProvisioningFailure>,
    service_name: Option<String>,
}

impl Provisioner {
    pub fn new(
        config: ProvisioningConfig,
        transport: Arc<dyn ProvisioningTransport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            phase: ProvisioningPhase::Idle,
            transport_active: false,
            received: None,
            failure: None,
            service_name: None,
        }
    }

    pub fn phase(&self) -> ProvisioningPhase {
        self.phase
    }

    pub fn failure(&self) -> Option<ProvisioningFailure> {
        self.failure
    }

    /// Name advertised by the active (or last) provisioning session.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn is_transport_active(&self) -> bool {
        self.transport_active
    }

    /// Leave `Idle`.
    ///
    /// Already provisioned: terminate in `Succeeded` without touching the
    /// transport. Otherwise activate the transport and enter
    /// `Provisioning`; an activation failure is fatal to the caller.
    pub fn start(
        &mut self,
        already_provisioned: bool,
        address: &HardwareAddress,
    ) -> Result<ProvisioningPhase, CoreError> {
        if self.phase != ProvisioningPhase::Idle {
            return Err(CoreError::InvalidTransition {
                state: self.phase.to_string(),
                event: "start",
            });
        }

        if already_provisioned {
            info!("already provisioned; skipping provisioning transport");
            self.phase = ProvisioningPhase::Succeeded;
            return Ok(self.phase);
        }

        let session = self.session(address);
        info!(
            transport = %session.transport,
            security = %session.security,
            service_name = %session.service_name,
            "starting provisioning"
        );
        self.transport
            .activate(&session)
            .map_err(|e| CoreError::TransportActivation {
                transport: session.transport.to_string(),
                reason: e.to_string(),
            })?;

        self.transport_active = true;
        self.service_name = Some(session.service_name);
        self.phase = ProvisioningPhase::Provisioning;
        Ok(self.phase)
    }

    /// Apply a provisioning-class event.
    ///
    /// Anything not listed in the transition table is rejected with
    /// [`CoreError::InvalidTransition`] and leaves the phase untouched.
    pub fn handle(&mut self, event: &ConnectivityEvent) -> Result<ProvisioningStep, CoreError> {
        use ConnectivityEvent as E;
        use ProvisioningPhase as P;

        match (self.phase, event) {
            (P::Provisioning, E::ProvisioningStarted) => {
                info!("provisioning started");
                Ok(ProvisioningStep::Noted)
            }
            (P::Provisioning, E::CredentialsReceived { ssid, secret }) => {
                info!(ssid = %ssid, "received Wi-Fi credentials");
                self.received = Some(WifiCredentials {
                    ssid: ssid.clone(),
                    password: secret.clone(),
                });
                Ok(ProvisioningStep::CredentialsReceived)
            }
            (P::Provisioning, E::ProvisioningFailed { cause }) => {
                error!(
                    error = %CoreError::Provisioning(*cause),
                    "provisioning failed; reset to factory and retry provisioning"
                );
                self.failure = Some(*cause);
                self.phase = P::Failed;
                Ok(ProvisioningStep::Failed(*cause))
            }
            (P::Provisioning, E::ProvisioningSucceeded) => {
                info!("provisioning successful");
                self.persist_success();
                self.phase = P::Succeeded;
                Ok(ProvisioningStep::Succeeded)
            }
            (P::Succeeded | P::Failed, E::ProvisioningEnded) => {
                info!("provisioning ended");
                self.release_transport();
                self.phase = P::Ended;
                Ok(ProvisioningStep::Ended)
            }
            (phase, event) => {
                debug!(%phase, event = event.name(), "provisioning event ignored");
                Err(CoreError::InvalidTransition {
                    state: phase.to_string(),
                    event: event.name(),
                })
            }
        }
    }

    /// Credentials to start the station with after success.
    pub fn take_credentials(&mut self) -> Option<WifiCredentials> {
        self.received.take()
    }

    /// Back to `Idle`, releasing the transport if it is still held.
    pub fn reset(&mut self) {
        self.release_transport();
        self.phase = ProvisioningPhase::Idle;
        self.received = None;
        self.failure = None;
        self.service_name = None;
    }

    fn session(&self, address: &HardwareAddress) -> ProvisioningSession {
        let cfg = &self.config;
        let short_range = cfg.transport == TransportKind::ShortRangeRadio;
        let authenticated = cfg.security == SecurityLevel::Authenticated;

        ProvisioningSession {
            transport: cfg.transport,
            security: cfg.security,
            service_name: service_name(&cfg.service_name_prefix, address),
            service_key: if short_range { None } else { cfg.service_key.clone() },
            proof_of_possession: if authenticated {
                cfg.proof_of_possession.clone()
            } else {
                None
            },
            service_uuid: short_range.then_some(cfg.ble_service_uuid),
        }
    }

    fn persist_success(&self) {
        let saved = match self.received {
            Some(ref credentials) => self.store.save_credentials(credentials),
            None => {
                debug!("no credentials captured during provisioning; driver keeps its own");
                self.store.mark_provisioned()
            }
        };
        if let Err(e) = saved {
            warn!(error = %e, "failed to persist provisioned state");
        }
    }

    fn release_transport(&mut self) {
        if self.transport_active {
            self.transport.deactivate();
            self.transport_active = false;
            debug!("provisioning transport released");
        }
    }
}
