// ── Host collaborators ──
//
// Everything the Coordinator commands, implemented for a host machine.

pub mod cloud;
pub mod devices;
pub mod report;
pub mod store;

use std::sync::Arc;

use tokio::runtime::Handle;

use devlink_config::Config;
use devlink_core::{CoreError, DeviceCloudHandler, Services};

use self::cloud::{HostCloud, HostOta};
use self::devices::{HostRadio, LogIndicator, LogTransport};
use self::store::FileCredentialStore;

pub struct Host {
    pub radio: Arc<HostRadio>,
    pub transport: Arc<LogTransport>,
    pub cloud: Arc<HostCloud>,
    pub ota: Arc<HostOta>,
    pub indicator: Arc<LogIndicator>,
    pub store: Arc<FileCredentialStore>,
}

impl Host {
    /// Wire host collaborators from configuration. Tasks spawn onto `runtime`.
    pub fn new(config: &Config, runtime: &Handle) -> Result<Self, CoreError> {
        Ok(Self {
            radio: Arc::new(HostRadio::new(config.hardware_address())),
            transport: Arc::new(LogTransport::default()),
            cloud: Arc::new(HostCloud::new(runtime.clone(), Arc::new(DeviceCloudHandler))),
            ota: Arc::new(HostOta::new(runtime.clone())),
            indicator: Arc::new(LogIndicator::new()),
            store: Arc::new(FileCredentialStore::open(&config.state_dir())?),
        })
    }

    pub fn services(&self) -> Services {
        Services {
            radio: self.radio.clone(),
            transport: self.transport.clone(),
            cloud: self.cloud.clone(),
            ota: self.ota.clone(),
            indicator: self.indicator.clone(),
            store: self.store.clone(),
        }
    }
}
