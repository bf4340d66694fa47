// ── Network credentials ──

use secrecy::SecretString;

/// Station credentials for the target access point.
#[derive(Debug, Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: SecretString,
}

impl WifiCredentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: SecretString::from(password.into()),
        }
    }
}
