// ── Host stand-ins for the radio, provisioning transport and LED ──
//
// On a host there is no radio: commands are logged, and the completion
// events they would produce come from the event script instead.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::ExposeSecret;
use tracing::{debug, info};

use devlink_core::{
    HardwareAddress, Indicator, IndicatorPattern, ProvisioningSession, ProvisioningTransport,
    RadioDriver, ServiceError, WifiCredentials,
};

// ── Radio ────────────────────────────────────────────────────────────

pub struct HostRadio {
    address: HardwareAddress,
}

impl HostRadio {
    pub fn new(address: HardwareAddress) -> Self {
        Self { address }
    }
}

impl RadioDriver for HostRadio {
    fn hardware_address(&self) -> HardwareAddress {
        self.address
    }

    fn start_station(&self, credentials: Option<&WifiCredentials>) -> Result<(), ServiceError> {
        match credentials {
            Some(creds) => info!(
                ssid = %creds.ssid,
                open = creds.password.expose_secret().is_empty(),
                "radio: station mode"
            ),
            None => info!("radio: station mode with driver-held credentials"),
        }
        Ok(())
    }

    fn connect(&self) -> Result<(), ServiceError> {
        info!("radio: connect requested");
        Ok(())
    }
}

// ── Provisioning transport ───────────────────────────────────────────

#[derive(Default)]
pub struct LogTransport {
    active: AtomicBool,
}

impl ProvisioningTransport for LogTransport {
    fn activate(&self, session: &ProvisioningSession) -> Result<(), ServiceError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::new("provisioning", "transport already active"));
        }
        info!(
            transport = %session.transport,
            security = %session.security,
            service_name = %session.service_name,
            service_key = session.service_key.is_some(),
            pop = session.proof_of_possession.is_some(),
            service_uuid = ?session.service_uuid,
            "provisioning transport up"
        );
        Ok(())
    }

    fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("provisioning transport down");
        }
    }
}

// ── Indicator ────────────────────────────────────────────────────────

pub struct LogIndicator {
    current: Mutex<IndicatorPattern>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(IndicatorPattern::Off),
        }
    }

    pub fn current(&self) -> IndicatorPattern {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for LogIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for LogIndicator {
    fn set_pattern(&self, pattern: IndicatorPattern) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *current == pattern {
            debug!(%pattern, "indicator unchanged");
            return;
        }
        *current = pattern;
        info!(%pattern, "indicator");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use devlink_core::{SecurityLevel, TransportKind};

    use super::*;

    fn session() -> ProvisioningSession {
        ProvisioningSession {
            transport: TransportKind::SoftAccessPoint,
            security: SecurityLevel::Plaintext,
            service_name: "PROV_000001".into(),
            service_key: None,
            proof_of_possession: None,
            service_uuid: None,
        }
    }

    #[test]
    fn transport_rejects_double_activation() {
        let transport = LogTransport::default();
        transport.activate(&session()).unwrap();
        assert!(transport.activate(&session()).is_err());

        transport.deactivate();
        transport.deactivate();
        transport.activate(&session()).unwrap();
    }

    #[test]
    fn indicator_tracks_latest_pattern() {
        let indicator = LogIndicator::new();
        assert_eq!(indicator.current(), IndicatorPattern::Off);
        indicator.set_pattern(IndicatorPattern::SEARCHING);
        indicator.set_pattern(IndicatorPattern::On);
        assert_eq!(indicator.current(), IndicatorPattern::On);
    }
}
