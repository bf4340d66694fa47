//! Device configuration for devlink.
//!
//! TOML file + `DEVLINK_*` environment, validated once at startup and
//! translated into `devlink_core::CoordinatorConfig`. Nothing here is
//! mutated after load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use devlink_core::{
    CoordinatorConfig, CoreError, DEFAULT_BLE_SERVICE_UUID, HardwareAddress, ProvisioningConfig,
    RetryCeiling, SecurityLevel, TransportKind, WifiCredentials,
};

/// Environment prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "DEVLINK_";

const MASK: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level device configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub provisioning: ProvisioningSection,

    #[serde(default)]
    pub wifi: WifiSection,

    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub ota: OtaSection,

    #[serde(default)]
    pub report: ReportSection,

    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisioningSection {
    /// "soft-ap", "ble" or "manual".
    #[serde(default)]
    pub transport: TransportKind,

    /// "plaintext" or "authenticated".
    #[serde(default)]
    pub security: SecurityLevel,

    #[serde(
        default = "default_service_name_prefix",
        deserialize_with = "scalar::string"
    )]
    pub service_name_prefix: String,

    /// Soft-AP password (plaintext). Ignored for BLE.
    #[serde(default, deserialize_with = "scalar::opt_string")]
    pub service_key: Option<String>,

    /// Proof-of-possession for authenticated security.
    #[serde(default, deserialize_with = "scalar::opt_string")]
    pub pop: Option<String>,

    #[serde(default = "default_ble_service_uuid")]
    pub ble_service_uuid: Uuid,
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            security: SecurityLevel::default(),
            service_name_prefix: default_service_name_prefix(),
            service_key: None,
            pop: None,
            ble_service_uuid: default_ble_service_uuid(),
        }
    }
}

fn default_service_name_prefix() -> String {
    "PROV_".into()
}
fn default_ble_service_uuid() -> Uuid {
    DEFAULT_BLE_SERVICE_UUID
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WifiSection {
    /// Integer >= 0, -1 or "unlimited".
    #[serde(default)]
    pub max_retry: RetryCeiling,

    /// Station SSID for the manual transport.
    #[serde(default, deserialize_with = "scalar::opt_string")]
    pub ssid: Option<String>,

    /// Station password for the manual transport (plaintext).
    #[serde(default, deserialize_with = "scalar::opt_string")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceSection {
    #[serde(default = "default_hardware_address")]
    pub hardware_address: HardwareAddress,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            hardware_address: default_hardware_address(),
        }
    }
}

/// Locally administered address used when none is configured.
fn default_hardware_address() -> HardwareAddress {
    HardwareAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OtaSection {
    pub update_url: Option<Url>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportSection {
    /// Seconds between reported-state updates; 0 disables the producer.
    #[serde(default = "default_report_interval")]
    pub interval_secs: u64,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            interval_secs: default_report_interval(),
        }
    }
}

fn default_report_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageSection {
    /// Directory holding the persisted provisioning state.
    pub state_dir: Option<PathBuf>,
}

// ── Text fields ─────────────────────────────────────────────────────

/// Free-text settings that the environment layer may have typed as a
/// number or boolean (`DEVLINK_WIFI__PASSWORD=12345678`).
mod scalar {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
    }

    impl From<Scalar> for String {
        fn from(value: Scalar) -> Self {
            match value {
                Scalar::Text(text) => text,
                Scalar::Unsigned(n) => n.to_string(),
                Scalar::Signed(n) => n.to_string(),
                Scalar::Float(n) => n.to_string(),
                Scalar::Flag(b) => b.to_string(),
            }
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Scalar::deserialize(deserializer).map(String::from)
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "devlink", "devlink")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".devlink").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_state_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".devlink").join("state"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load and validate the config: defaults < TOML file < environment.
///
/// A missing file is not an error; the defaults and environment apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.to_coordinator_config()?;
    Ok(config)
}

impl Config {
    /// Translate into the core configuration, validating as we go.
    pub fn to_coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        let prov = &self.provisioning;
        let provisioning = ProvisioningConfig {
            transport: prov.transport,
            security: prov.security,
            service_name_prefix: prov.service_name_prefix.clone(),
            service_key: prov.service_key.clone().map(SecretString::from),
            proof_of_possession: prov.pop.clone().map(SecretString::from),
            ble_service_uuid: prov.ble_service_uuid,
        };

        let manual_credentials = self.wifi.ssid.as_ref().map(|ssid| {
            WifiCredentials::new(ssid.clone(), self.wifi.password.clone().unwrap_or_default())
        });

        let config = CoordinatorConfig {
            provisioning,
            max_retries: self.wifi.max_retry,
            manual_credentials,
            ota_update_url: self.ota.update_url.clone(),
        };
        config
            .provisioning
            .validate()
            .map_err(|e| validation_error("provisioning.pop", &e))?;
        config
            .validate()
            .map_err(|e| validation_error("wifi.ssid", &e))?;
        Ok(config)
    }

    pub fn hardware_address(&self) -> HardwareAddress {
        self.device.hardware_address
    }

    /// Cadence of the periodic report producer; `None` when disabled.
    pub fn report_interval(&self) -> Option<Duration> {
        (self.report.interval_secs > 0).then(|| Duration::from_secs(self.report.interval_secs))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.storage
            .state_dir
            .clone()
            .unwrap_or_else(default_state_dir)
    }

    /// Copy with every secret replaced by a mask, for display.
    pub fn redacted(&self) -> Config {
        let mut shown = self.clone();
        let mask = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some(MASK.into());
            }
        };
        mask(&mut shown.provisioning.service_key);
        mask(&mut shown.provisioning.pop);
        mask(&mut shown.wifi.password);
        shown
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn validation_error(field: &str, err: &CoreError) -> ConfigError {
    let reason = match err {
        CoreError::Config { message } => message.clone(),
        other => other.to_string(),
    };
    ConfigError::Validation {
        field: field.into(),
        reason,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn load(jail: &Jail) -> Result<Config, figment::Error> {
        let path = jail.directory().join("config.toml");
        load_config(Some(&path)).map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn defaults_apply_without_file() {
        Jail::expect_with(|jail| {
            let config = load(jail)?;
            assert_eq!(config.provisioning.transport, TransportKind::SoftAccessPoint);
            assert_eq!(config.provisioning.service_name_prefix, "PROV_");
            assert_eq!(config.wifi.max_retry, RetryCeiling::Limited(5));
            assert_eq!(config.report_interval(), Some(Duration::from_secs(5)));
            assert!(config.ota.update_url.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_file_is_loaded() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [provisioning]
                transport = "ble"
                security = "authenticated"
                pop = "abcd1234"

                [wifi]
                max_retry = "unlimited"

                [device]
                hardware_address = "24:6f:28:a1:b2:c3"

                [ota]
                update_url = "https://fw.example.com/device.bin"

                [report]
                interval_secs = 0
                "#,
            )?;

            let config = load(jail)?;
            assert_eq!(config.provisioning.transport, TransportKind::ShortRangeRadio);
            assert_eq!(config.wifi.max_retry, RetryCeiling::Unlimited);
            assert_eq!(config.hardware_address().suffix_hex(), "A1B2C3");
            assert_eq!(config.report_interval(), None);

            let core = config.to_coordinator_config().unwrap();
            assert_eq!(core.provisioning.security, SecurityLevel::Authenticated);
            assert_eq!(
                core.ota_update_url.unwrap().as_str(),
                "https://fw.example.com/device.bin"
            );
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[wifi]\nmax_retry = 3\n")?;
            jail.set_env("DEVLINK_WIFI__MAX_RETRY", "-1");
            jail.set_env("DEVLINK_PROVISIONING__SERVICE_NAME_PREFIX", "LAB_");

            let config = load(jail)?;
            assert_eq!(config.wifi.max_retry, RetryCeiling::Unlimited);
            assert_eq!(config.provisioning.service_name_prefix, "LAB_");
            Ok(())
        });
    }

    #[test]
    fn numeric_secrets_from_environment_stay_text() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                "[provisioning]\ntransport = \"manual\"\nsecurity = \"authenticated\"\n",
            )?;
            jail.set_env("DEVLINK_WIFI__SSID", "5550");
            jail.set_env("DEVLINK_WIFI__PASSWORD", "12345678");
            jail.set_env("DEVLINK_PROVISIONING__POP", "87654321");
            jail.set_env("DEVLINK_PROVISIONING__SERVICE_KEY", "true");

            let config = load(jail)?;
            assert_eq!(config.wifi.ssid.as_deref(), Some("5550"));
            assert_eq!(config.wifi.password.as_deref(), Some("12345678"));
            assert_eq!(config.provisioning.pop.as_deref(), Some("87654321"));
            assert_eq!(config.provisioning.service_key.as_deref(), Some("true"));

            let core = config.to_coordinator_config().unwrap();
            let creds = core.manual_credentials.unwrap();
            assert_eq!(creds.password.expose_secret(), "12345678");
            Ok(())
        });
    }

    #[test]
    fn authenticated_without_pop_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[provisioning]\nsecurity = \"authenticated\"\n")?;
            let err = load_config(Some(&jail.directory().join("config.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "provisioning.pop"));
            Ok(())
        });
    }

    #[test]
    fn manual_transport_requires_ssid() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[provisioning]\ntransport = \"manual\"\n")?;
            let err = load_config(Some(&jail.directory().join("config.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "wifi.ssid"));

            jail.create_file(
                "config.toml",
                "[provisioning]\ntransport = \"manual\"\n[wifi]\nssid = \"lab\"\npassword = \"pw\"\n",
            )?;
            let config = load(jail)?;
            let core = config.to_coordinator_config().unwrap();
            assert_eq!(core.manual_credentials.unwrap().ssid, "lab");
            Ok(())
        });
    }

    #[test]
    fn negative_retry_other_than_sentinel_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[wifi]\nmax_retry = -2\n")?;
            assert!(load_config(Some(&jail.directory().join("config.toml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn malformed_hardware_address_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[device]\nhardware_address = \"not-a-mac\"\n")?;
            assert!(load_config(Some(&jail.directory().join("config.toml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn redacted_config_hides_secrets() {
        let mut config = Config::default();
        config.provisioning.pop = Some("abcd1234".into());
        config.wifi.password = Some("hunter22".into());

        let shown = config.redacted().to_toml().unwrap();
        assert!(!shown.contains("abcd1234"));
        assert!(!shown.contains("hunter22"));
        assert!(shown.contains(MASK));
        assert!(shown.contains("max_retry = 5"));
    }
}
