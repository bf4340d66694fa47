// ── Connectivity coordinator ──
//
// Top-level state machine owning the device's network lifecycle. Every
// downstream command (radio, cloud, OTA, indicator) is issued from a
// transition here and nowhere else. The Coordinator never blocks: it
// issues fire-and-forget commands and learns their outcome from later
// events.

mod dispatch;

pub use dispatch::CoordinatorHandle;

use std::net::Ipv4Addr;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cloud::ReportCallback;
use crate::config::CoordinatorConfig;
use crate::error::CoreError;
use crate::model::{
    ConnectivityEvent, DeviceConnectivityState, DisconnectReason, EventClass, HardwareAddress,
    IndicatorPattern, WifiCredentials,
};
use crate::provisioning::{Provisioner, ProvisioningPhase, ProvisioningStep};
use crate::retry::should_retry;
use crate::service::{CloudService, Services};

use DeviceConnectivityState as State;

// ── Observable state ─────────────────────────────────────────────

/// Point-in-time view of the Coordinator, published on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorSnapshot {
    pub state: DeviceConnectivityState,
    pub retry_count: u32,
    /// `None` in manual-credential mode.
    pub provisioning: Option<ProvisioningPhase>,
}

/// Outcome of a handled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DeviceConnectivityState,
    pub to: DeviceConnectivityState,
}

impl Transition {
    pub fn changed(self) -> bool {
        self.from != self.to
    }
}

// ── Coordinator ──────────────────────────────────────────────────

/// Single owner of [`DeviceConnectivityState`] and the retry counter.
///
/// Mutated only through `&mut self`; concurrent producers go through a
/// [`CoordinatorHandle`], which serializes them.
pub struct Coordinator {
    config: CoordinatorConfig,
    services: Services,
    hardware_address: HardwareAddress,
    state: DeviceConnectivityState,
    retry_count: u32,
    /// Absent in manual mode.
    provisioner: Option<Provisioner>,
    snapshot: watch::Sender<CoordinatorSnapshot>,
}

impl Coordinator {
    /// Build the Coordinator from validated configuration.
    ///
    /// Reads the persisted provisioned flag once. Manual mode and
    /// provisioned devices begin in `ConnectingToNetwork`; everything else
    /// begins in `Unprovisioned`. Nothing is commanded until [`start`](Self::start).
    pub fn new(config: CoordinatorConfig, services: Services) -> Result<Self, CoreError> {
        config.validate()?;

        let provisioned = config.is_manual() || services.store.is_provisioned()?;
        let provisioner = (!config.is_manual()).then(|| {
            Provisioner::new(
                config.provisioning.clone(),
                services.transport.clone(),
                services.store.clone(),
            )
        });
        let state = if provisioned {
            State::ConnectingToNetwork
        } else {
            State::Unprovisioned
        };
        let hardware_address = services.radio.hardware_address();

        let (snapshot, _) = watch::channel(CoordinatorSnapshot {
            state,
            retry_count: 0,
            provisioning: provisioner.as_ref().map(Provisioner::phase),
        });

        services.indicator.set_pattern(IndicatorPattern::Off);
        info!(
            %state,
            transport = %config.provisioning.transport,
            max_retries = %config.max_retries,
            address = %hardware_address,
            "coordinator initialised"
        );

        Ok(Self {
            config,
            services,
            hardware_address,
            state,
            retry_count: 0,
            provisioner,
            snapshot,
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn state(&self) -> DeviceConnectivityState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn provisioning_phase(&self) -> Option<ProvisioningPhase> {
        self.provisioner.as_ref().map(Provisioner::phase)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn hardware_address(&self) -> HardwareAddress {
        self.hardware_address
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        *self.snapshot.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshot.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Leave the boot state.
    ///
    /// Unprovisioned: activate the provisioning transport. Otherwise
    /// start the radio in station mode. A transport or station that
    /// cannot be started is fatal.
    pub fn start(&mut self) -> Result<DeviceConnectivityState, CoreError> {
        match self.state {
            State::Unprovisioned => {
                let provisioner = self.provisioner.as_mut().ok_or_else(|| CoreError::Config {
                    message: "provisioning transport required when not provisioned".into(),
                })?;
                provisioner.start(false, &self.hardware_address)?;
                self.services.indicator.set_pattern(IndicatorPattern::PROVISIONING);
                self.set_state(State::Provisioning);
            }
            State::ConnectingToNetwork => {
                if let Some(provisioner) = self.provisioner.as_mut() {
                    provisioner.start(true, &self.hardware_address)?;
                }
                let credentials = self.boot_credentials();
                self.start_station(credentials.as_ref())?;
                self.publish_snapshot();
            }
            other => {
                return Err(CoreError::InvalidTransition {
                    state: other.to_string(),
                    event: "start",
                });
            }
        }
        Ok(self.state)
    }

    /// Apply one producer event.
    ///
    /// Events outside the transition table are rejected with
    /// [`CoreError::InvalidTransition`] and change nothing.
    pub fn handle(&mut self, event: &ConnectivityEvent) -> Result<Transition, CoreError> {
        let from = self.state;
        debug!(state = %from, event = event.name(), "handling event");

        match (from, event) {
            (_, event) if event.class() == EventClass::Provisioning => {
                self.on_provisioning_event(event)?;
            }
            (State::ConnectingToNetwork, ConnectivityEvent::LinkStarted) => {
                info!("station started; connecting");
                self.request_connect();
            }
            (
                State::ConnectingToNetwork | State::Reconnecting,
                ConnectivityEvent::LinkDisconnected { reason },
            ) => {
                self.retry_or_abandon(*reason);
            }
            (State::Connected, ConnectivityEvent::LinkDisconnected { reason }) => {
                warn!(%reason, "connection lost");
                self.services.cloud.stop();
                self.services.indicator.set_pattern(IndicatorPattern::SEARCHING);
                self.retry_or_abandon(*reason);
            }
            (state, ConnectivityEvent::IpAcquired { address }) if state.is_connecting() => {
                self.on_connected(*address);
            }
            (state, event) => {
                return Err(CoreError::InvalidTransition {
                    state: state.to_string(),
                    event: event.name(),
                });
            }
        }

        self.publish_snapshot();
        Ok(Transition {
            from,
            to: self.state,
        })
    }

    /// External intervention that leaves `ConnectionAbandoned` or failed
    /// provisioning: erase persisted state and start over.
    pub fn factory_reset(&mut self) -> Result<DeviceConnectivityState, CoreError> {
        warn!(state = %self.state, "factory reset requested");

        self.services.store.erase()?;
        self.services.cloud.stop();
        self.retry_count = 0;
        if let Some(provisioner) = self.provisioner.as_mut() {
            provisioner.reset();
        }
        self.services.indicator.set_pattern(IndicatorPattern::Off);

        let boot_state = if self.config.is_manual() {
            State::ConnectingToNetwork
        } else {
            State::Unprovisioned
        };
        self.set_state(boot_state);
        self.start()
    }

    /// Queue a reported-state update on the cloud client.
    ///
    /// Only accepted while connected; the completion callback reports
    /// delivery asynchronously and failures are never retried here.
    pub fn send_reported_state(
        &self,
        payload: Value,
        on_complete: ReportCallback,
    ) -> Result<(), CoreError> {
        forward_report(self.state, self.services.cloud.as_ref(), payload, on_complete)
    }

    // ── Transition helpers ───────────────────────────────────────

    fn on_provisioning_event(&mut self, event: &ConnectivityEvent) -> Result<(), CoreError> {
        let Some(provisioner) = self.provisioner.as_mut() else {
            return Err(CoreError::InvalidTransition {
                state: self.state.to_string(),
                event: event.name(),
            });
        };

        match provisioner.handle(event)? {
            ProvisioningStep::Noted | ProvisioningStep::CredentialsReceived | ProvisioningStep::Ended => {}
            ProvisioningStep::Failed(_) => {
                self.services.indicator.set_pattern(IndicatorPattern::ERROR);
            }
            ProvisioningStep::Succeeded => {
                let credentials = provisioner.take_credentials();
                self.set_state(State::ConnectingToNetwork);
                self.start_station(credentials.as_ref())?;
            }
        }
        Ok(())
    }

    fn on_connected(&mut self, address: Ipv4Addr) {
        info!(%address, "got IP address");
        self.retry_count = 0;
        self.set_state(State::Connected);

        if let Err(e) = self.services.cloud.start() {
            let err = CoreError::from(e);
            error!(error = %err, "continuing without cloud client");
        }
        if let Some(url) = &self.config.ota_update_url {
            if let Err(e) = self.services.ota.start(url) {
                let err = CoreError::from(e);
                error!(error = %err, "continuing without firmware updates");
            }
        }
        self.services.indicator.set_pattern(IndicatorPattern::On);
    }

    fn retry_or_abandon(&mut self, reason: DisconnectReason) {
        if should_retry(self.retry_count, self.config.max_retries) {
            self.retry_count = self.retry_count.saturating_add(1);
            info!(
                %reason,
                attempt = self.retry_count,
                max = %self.config.max_retries,
                "retrying connection to the access point"
            );
            self.set_state(State::Reconnecting);
            self.request_connect();
            self.services.indicator.set_pattern(IndicatorPattern::SEARCHING);
        } else {
            let err = CoreError::RetriesExhausted {
                attempts: self.retry_count,
            };
            error!(%reason, error = %err, "giving up on the access point");
            self.set_state(State::ConnectionAbandoned);
            self.services.indicator.set_pattern(IndicatorPattern::ERROR);
        }
    }

    fn request_connect(&self) {
        if let Err(e) = self.services.radio.connect() {
            warn!(error = %e, "connect request failed; waiting for next link event");
        }
    }

    fn start_station(&self, credentials: Option<&WifiCredentials>) -> Result<(), CoreError> {
        match credentials {
            Some(creds) => info!(ssid = %creds.ssid, "starting station"),
            None => info!("starting station with driver-held credentials"),
        }
        self.services
            .radio
            .start_station(credentials)
            .map_err(|e| CoreError::TransportActivation {
                transport: "station".into(),
                reason: e.to_string(),
            })?;
        self.services.indicator.set_pattern(IndicatorPattern::SEARCHING);
        Ok(())
    }

    fn boot_credentials(&self) -> Option<WifiCredentials> {
        if self.config.is_manual() {
            return self.config.manual_credentials.clone();
        }
        match self.services.store.load_credentials() {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "could not read stored credentials");
                None
            }
        }
    }

    fn set_state(&mut self, next: DeviceConnectivityState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "connectivity state changed");
            self.state = next;
        }
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(CoordinatorSnapshot {
            state: self.state,
            retry_count: self.retry_count,
            provisioning: self.provisioning_phase(),
        });
    }
}

fn forward_report(
    state: DeviceConnectivityState,
    cloud: &dyn CloudService,
    payload: Value,
    on_complete: ReportCallback,
) -> Result<(), CoreError> {
    if state != State::Connected {
        return Err(CoreError::NotConnected);
    }
    cloud.send_reported_state(payload, on_complete);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use url::Url;

    use super::*;
    use crate::cloud::log_report_completion;
    use crate::config::TransportKind;
    use crate::error::ServiceError;
    use crate::provisioning::ProvisioningSession;
    use crate::retry::RetryCeiling;
    use crate::service::{Indicator, OtaService, ProvisioningTransport, RadioDriver};
    use crate::store::{CredentialStore, MemoryCredentialStore};

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    struct Fakes {
        log: Arc<Log>,
        cloud_fails: bool,
    }

    impl RadioDriver for Fakes {
        fn hardware_address(&self) -> HardwareAddress {
            HardwareAddress::new([0x24, 0x6f, 0x28, 0xa1, 0xb2, 0xc3])
        }
        fn start_station(&self, credentials: Option<&WifiCredentials>) -> Result<(), ServiceError> {
            let ssid = credentials.map_or("-", |c| c.ssid.as_str());
            self.log.push(format!("station:{ssid}"));
            Ok(())
        }
        fn connect(&self) -> Result<(), ServiceError> {
            self.log.push("connect");
            Ok(())
        }
    }

    impl ProvisioningTransport for Fakes {
        fn activate(&self, session: &ProvisioningSession) -> Result<(), ServiceError> {
            self.log.push(format!("activate:{}", session.service_name));
            Ok(())
        }
        fn deactivate(&self) {
            self.log.push("deactivate");
        }
    }

    impl CloudService for Fakes {
        fn start(&self) -> Result<(), ServiceError> {
            if self.cloud_fails {
                return Err(ServiceError::new("cloud", "task creation failed"));
            }
            self.log.push("cloud:start");
            Ok(())
        }
        fn stop(&self) {
            self.log.push("cloud:stop");
        }
        fn is_running(&self) -> bool {
            false
        }
        fn send_reported_state(&self, _payload: Value, on_complete: ReportCallback) {
            self.log.push("report");
            on_complete(crate::cloud::ReportStatus(204));
        }
    }

    impl OtaService for Fakes {
        fn start(&self, update_url: &Url) -> Result<(), ServiceError> {
            self.log.push(format!("ota:{}", update_url.host_str().unwrap_or_default()));
            Ok(())
        }
    }

    impl Indicator for Fakes {
        fn set_pattern(&self, pattern: IndicatorPattern) {
            self.log.push(format!("led:{pattern}"));
        }
    }

    fn services(store: Arc<dyn CredentialStore>, cloud_fails: bool) -> (Services, Arc<Log>) {
        let log = Arc::new(Log::default());
        let fakes = Arc::new(Fakes {
            log: log.clone(),
            cloud_fails,
        });
        let services = Services {
            radio: fakes.clone(),
            transport: fakes.clone(),
            cloud: fakes.clone(),
            ota: fakes.clone(),
            indicator: fakes,
            store,
        };
        (services, log)
    }

    fn provisioned_store() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::provisioned(WifiCredentials::new("home", "pw")))
    }

    fn got_ip() -> ConnectivityEvent {
        ConnectivityEvent::IpAcquired {
            address: Ipv4Addr::new(192, 168, 1, 20),
        }
    }

    fn disconnected() -> ConnectivityEvent {
        ConnectivityEvent::LinkDisconnected {
            reason: DisconnectReason(201),
        }
    }

    #[test]
    fn provisioned_device_starts_station_with_stored_credentials() {
        let (services, log) = services(provisioned_store(), false);
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), services).unwrap();

        assert_eq!(coordinator.state(), State::ConnectingToNetwork);
        assert_eq!(coordinator.start().unwrap(), State::ConnectingToNetwork);
        assert_eq!(
            log.take(),
            vec!["led:off", "station:home", "led:blink(250ms)"]
        );
        assert_eq!(
            coordinator.provisioning_phase(),
            Some(ProvisioningPhase::Succeeded)
        );
    }

    #[test]
    fn ip_acquired_while_provisioning_is_rejected() {
        let (services, _log) = services(Arc::new(MemoryCredentialStore::new()), false);
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), services).unwrap();
        coordinator.start().unwrap();

        let err = coordinator.handle(&got_ip()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(coordinator.state(), State::Provisioning);
    }

    #[test]
    fn ip_acquired_unprovisioned_is_rejected() {
        let (services, _log) = services(Arc::new(MemoryCredentialStore::new()), false);
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), services).unwrap();

        assert!(coordinator.handle(&got_ip()).is_err());
        assert_eq!(coordinator.state(), State::Unprovisioned);
    }

    #[test]
    fn cloud_start_failure_keeps_connected_state() {
        let (services, log) = services(provisioned_store(), true);
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), services).unwrap();
        coordinator.start().unwrap();
        log.take();

        let transition = coordinator.handle(&got_ip()).unwrap();
        assert!(transition.changed());
        assert_eq!(transition.to, State::Connected);
        assert_eq!(log.take(), vec!["led:on"]);
    }

    #[test]
    fn ota_starts_only_when_update_url_configured() {
        let config = CoordinatorConfig {
            ota_update_url: Some(Url::parse("https://updates.example.com/fw.bin").unwrap()),
            ..CoordinatorConfig::default()
        };
        let (services, log) = services(provisioned_store(), false);
        let mut coordinator = Coordinator::new(config, services).unwrap();
        coordinator.start().unwrap();
        log.take();

        coordinator.handle(&got_ip()).unwrap();
        assert_eq!(
            log.take(),
            vec!["cloud:start", "ota:updates.example.com", "led:on"]
        );
    }

    #[test]
    fn zero_retry_ceiling_abandons_on_first_disconnect() {
        let config = CoordinatorConfig {
            max_retries: RetryCeiling::Limited(0),
            ..CoordinatorConfig::default()
        };
        let (services, _log) = services(provisioned_store(), false);
        let mut coordinator = Coordinator::new(config, services).unwrap();
        coordinator.start().unwrap();

        let transition = coordinator.handle(&disconnected()).unwrap();
        assert_eq!(transition.to, State::ConnectionAbandoned);
        assert_eq!(coordinator.retry_count(), 0);
        assert!(coordinator.handle(&disconnected()).is_err());
    }

    #[test]
    fn manual_mode_has_no_provisioner() {
        let mut config = CoordinatorConfig::default();
        config.provisioning.transport = TransportKind::Manual;
        config.manual_credentials = Some(WifiCredentials::new("lab", "secret"));

        let (services, log) = services(Arc::new(MemoryCredentialStore::new()), false);
        let mut coordinator = Coordinator::new(config, services).unwrap();
        assert_eq!(coordinator.provisioning_phase(), None);

        coordinator.start().unwrap();
        assert!(log.take().contains(&"station:lab".to_owned()));
        assert!(
            coordinator
                .handle(&ConnectivityEvent::ProvisioningSucceeded)
                .is_err()
        );
    }

    #[test]
    fn reported_state_requires_connection() {
        let (services, log) = services(provisioned_store(), false);
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), services).unwrap();
        coordinator.start().unwrap();

        let err = coordinator
            .send_reported_state(serde_json::json!({"uptime_secs": 1}), log_report_completion("test"))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotConnected));

        coordinator.handle(&got_ip()).unwrap();
        log.take();
        coordinator
            .send_reported_state(serde_json::json!({"uptime_secs": 2}), log_report_completion("test"))
            .unwrap();
        assert_eq!(log.take(), vec!["report"]);
    }

    #[test]
    fn snapshot_tracks_every_transition() {
        let (services, _log) = services(provisioned_store(), false);
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), services).unwrap();
        let mut rx = coordinator.subscribe();
        coordinator.start().unwrap();
        coordinator.handle(&disconnected()).unwrap();

        assert!(rx.has_changed().unwrap());
        let snapshot = *rx.borrow_and_update();
        assert_eq!(
            snapshot,
            CoordinatorSnapshot {
                state: State::Reconnecting,
                retry_count: 1,
                provisioning: Some(ProvisioningPhase::Succeeded),
            }
        );
        assert_eq!(coordinator.snapshot(), snapshot);
    }
}
