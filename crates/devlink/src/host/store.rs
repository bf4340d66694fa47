// ── File-backed persisted provisioning state ──
//
// One JSON document under the state directory. Written on provisioning
// success and erase; read once when opened.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use devlink_core::{CoreError, CredentialStore, WifiCredentials};

const STATE_FILE: &str = "provisioning.json";

#[derive(Debug, Default, Deserialize, Serialize)]
struct PersistedState {
    provisioned: bool,
    ssid: Option<String>,
    password: Option<String>,
}

impl PersistedState {
    fn credentials(&self) -> Option<WifiCredentials> {
        let ssid = self.ssid.clone()?;
        Some(WifiCredentials {
            ssid,
            password: SecretString::from(self.password.clone().unwrap_or_default()),
        })
    }
}

pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
    writable: bool,
}

impl FileCredentialStore {
    /// Open (creating if needed) the store under `dir`.
    ///
    /// A state file that cannot be decoded is erased and re-initialised.
    pub fn open(dir: &Path) -> Result<Self, CoreError> {
        fs::create_dir_all(dir).map_err(|e| storage(&e, dir))?;
        let path = dir.join(STATE_FILE);
        let state = read_state(&path, "erasing")?;

        let store = Self {
            path,
            state: Mutex::new(state),
            writable: true,
        };
        store.flush()?;
        debug!(path = %store.path.display(), "persisted state opened");
        Ok(store)
    }

    /// Inspect the store under `dir` without creating, rewriting or erasing
    /// anything. Writes through a read-only store fail.
    pub fn open_read_only(dir: &Path) -> Result<Self, CoreError> {
        let path = dir.join(STATE_FILE);
        let state = read_state(&path, "reporting as unprovisioned")?;
        Ok(Self {
            path,
            state: Mutex::new(state),
            writable: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with<T>(&self, f: impl FnOnce(&mut PersistedState) -> T) -> Result<T, CoreError> {
        let mut guard = self.state.lock().map_err(|_| CoreError::Storage {
            message: "persisted state lock poisoned".into(),
        })?;
        Ok(f(&mut guard))
    }

    fn ensure_writable(&self) -> Result<(), CoreError> {
        if self.writable {
            return Ok(());
        }
        Err(CoreError::Storage {
            message: format!("{}: opened read-only", self.path.display()),
        })
    }

    fn flush(&self) -> Result<(), CoreError> {
        let bytes = self.with(|state| serde_json::to_vec_pretty(&*state))?.map_err(|e| {
            CoreError::Storage {
                message: format!("failed to encode persisted state: {e}"),
            }
        })?;
        fs::write(&self.path, bytes).map_err(|e| storage(&e, &self.path))
    }
}

impl CredentialStore for FileCredentialStore {
    fn is_provisioned(&self) -> Result<bool, CoreError> {
        self.with(|state| state.provisioned)
    }

    fn load_credentials(&self) -> Result<Option<WifiCredentials>, CoreError> {
        self.with(|state| state.credentials())
    }

    fn save_credentials(&self, credentials: &WifiCredentials) -> Result<(), CoreError> {
        self.ensure_writable()?;
        self.with(|state| {
            state.provisioned = true;
            state.ssid = Some(credentials.ssid.clone());
            state.password = Some(credentials.password.expose_secret().to_owned());
        })?;
        self.flush()?;
        info!(ssid = %credentials.ssid, "credentials persisted");
        Ok(())
    }

    fn mark_provisioned(&self) -> Result<(), CoreError> {
        self.ensure_writable()?;
        self.with(|state| state.provisioned = true)?;
        self.flush()?;
        info!("provisioned flag persisted");
        Ok(())
    }

    fn erase(&self) -> Result<(), CoreError> {
        self.ensure_writable()?;
        self.with(|state| *state = PersistedState::default())?;
        self.flush()?;
        info!("persisted provisioning state erased");
        Ok(())
    }
}

/// Decode the state file. Missing or undecodable content reads as the
/// default (unprovisioned) state.
fn read_state(path: &Path, on_corrupt: &str) -> Result<PersistedState, CoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "persisted state unreadable; {on_corrupt}");
            PersistedState::default()
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(PersistedState::default()),
        Err(e) => Err(storage(&e, path)),
    }
}

fn storage(err: &std::io::Error, path: &Path) -> CoreError {
    CoreError::Storage {
        message: format!("{}: {err}", path.display()),
    }
}
