// ── Persisted provisioning state ──
//
// One "provisioned" flag plus the station credentials, in durable
// key-value storage. Read once at startup; written only by the
// provisioning state machine on success and by erase.

use std::sync::Mutex;

use crate::error::CoreError;
use crate::model::WifiCredentials;

/// Durable storage for the provisioned flag and credentials.
pub trait CredentialStore: Send + Sync {
    fn is_provisioned(&self) -> Result<bool, CoreError>;

    fn load_credentials(&self) -> Result<Option<WifiCredentials>, CoreError>;

    /// Persist credentials and set the provisioned flag.
    fn save_credentials(&self, credentials: &WifiCredentials) -> Result<(), CoreError>;

    /// Set the provisioned flag for credentials the radio driver keeps itself.
    fn mark_provisioned(&self) -> Result<(), CoreError>;

    /// Clear both the flag and the credentials.
    fn erase(&self) -> Result<(), CoreError>;
}

#[derive(Debug, Default)]
struct Persisted {
    provisioned: bool,
    credentials: Option<WifiCredentials>,
}

/// Volatile store for tests and devices without durable storage.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Persisted>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds credentials.
    pub fn provisioned(credentials: WifiCredentials) -> Self {
        Self {
            inner: Mutex::new(Persisted {
                provisioned: true,
                credentials: Some(credentials),
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Persisted) -> T) -> Result<T, CoreError> {
        let mut guard = self.inner.lock().map_err(|_| CoreError::Storage {
            message: "credential store lock poisoned".into(),
        })?;
        Ok(f(&mut guard))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn is_provisioned(&self) -> Result<bool, CoreError> {
        self.with(|p| p.provisioned)
    }

    fn load_credentials(&self) -> Result<Option<WifiCredentials>, CoreError> {
        self.with(|p| p.credentials.clone())
    }

    fn save_credentials(&self, credentials: &WifiCredentials) -> Result<(), CoreError> {
        self.with(|p| {
            p.provisioned = true;
            p.credentials = Some(credentials.clone());
        })
    }

    fn mark_provisioned(&self) -> Result<(), CoreError> {
        self.with(|p| p.provisioned = true)
    }

    fn erase(&self) -> Result<(), CoreError> {
        self.with(|p| *p = Persisted::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn save_sets_flag_and_erase_clears_everything() {
        let store = MemoryCredentialStore::new();
        assert!(!store.is_provisioned().unwrap());

        store
            .save_credentials(&WifiCredentials::new("home", "pw"))
            .unwrap();
        assert!(store.is_provisioned().unwrap());
        let creds = store.load_credentials().unwrap().unwrap();
        assert_eq!(creds.ssid, "home");
        assert_eq!(creds.password.expose_secret(), "pw");

        store.erase().unwrap();
        assert!(!store.is_provisioned().unwrap());
        assert!(store.load_credentials().unwrap().is_none());
    }

    #[test]
    fn mark_provisioned_keeps_no_credentials() {
        let store = MemoryCredentialStore::new();
        store.mark_provisioned().unwrap();
        assert!(store.is_provisioned().unwrap());
        assert!(store.load_credentials().unwrap().is_none());
    }
}
