// ── Runtime connectivity configuration ──
//
// Resolved once at startup and never mutated. The config crate builds a
// `CoordinatorConfig` from TOML + environment and hands it in; core never
// touches disk or the environment itself.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::WifiCredentials;
use crate::retry::RetryCeiling;

/// Custom 128-bit UUID advertised as the primary GATT service when
/// provisioning over the short-range radio.
pub const DEFAULT_BLE_SERVICE_UUID: Uuid = Uuid::from_u128(0x1234_5678_90ab_cdef_fedc_ba09_8765_4321);

/// Local channel over which credentials are handed to the device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum TransportKind {
    /// Temporary access point; the service name becomes its SSID.
    #[default]
    #[strum(serialize = "soft-ap")]
    #[serde(rename = "soft-ap")]
    SoftAccessPoint,
    /// Short-range radio (BLE); the service name becomes the device name.
    #[strum(serialize = "ble")]
    #[serde(rename = "ble")]
    ShortRangeRadio,
    /// Static credentials from configuration; provisioning is bypassed.
    #[strum(serialize = "manual")]
    #[serde(rename = "manual")]
    Manual,
}

/// Security of the provisioning channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SecurityLevel {
    #[default]
    Plaintext,
    /// Authenticated encryption gated by a proof-of-possession string.
    Authenticated,
}

/// How the device obtains its network credentials.
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    pub transport: TransportKind,
    pub security: SecurityLevel,
    /// Prefix of the advertised service name (e.g. `PROV_`).
    pub service_name_prefix: String,
    /// Soft-AP password. Ignored by the short-range radio transport.
    pub service_key: Option<SecretString>,
    /// Required (non-empty) when `security` is `Authenticated`.
    pub proof_of_possession: Option<SecretString>,
    pub ble_service_uuid: Uuid,
}

impl ProvisioningConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let pop_present = self
            .proof_of_possession
            .as_ref()
            .is_some_and(|pop| !pop.expose_secret().is_empty());

        if self.security == SecurityLevel::Authenticated && !pop_present {
            return Err(CoreError::Config {
                message: "authenticated provisioning requires a non-empty proof-of-possession"
                    .into(),
            });
        }
        Ok(())
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            security: SecurityLevel::default(),
            service_name_prefix: "PROV_".into(),
            service_key: None,
            proof_of_possession: None,
            ble_service_uuid: DEFAULT_BLE_SERVICE_UUID,
        }
    }
}

/// Everything the Coordinator needs, built once at boot.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub provisioning: ProvisioningConfig,
    /// Consecutive reconnect attempts before the connection is abandoned.
    pub max_retries: RetryCeiling,
    /// Station credentials used when `transport` is `Manual`.
    pub manual_credentials: Option<WifiCredentials>,
    /// Firmware update endpoint. `None` = the OTA task is never started.
    pub ota_update_url: Option<Url>,
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.provisioning.validate()?;

        if self.provisioning.transport == TransportKind::Manual {
            let ssid_present = self
                .manual_credentials
                .as_ref()
                .is_some_and(|creds| !creds.ssid.is_empty());
            if !ssid_present {
                return Err(CoreError::Config {
                    message: "manual transport requires static credentials with an SSID".into(),
                });
            }
        }
        Ok(())
    }

    pub fn is_manual(&self) -> bool {
        self.provisioning.transport == TransportKind::Manual
    }
}
