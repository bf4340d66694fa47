//! `devlink status` and `devlink erase`: persisted provisioning state.

use devlink_config::Config;
use devlink_core::{CredentialStore, TransportKind, service_name};

use crate::error::CliError;
use crate::host::store::FileCredentialStore;

pub fn status(config: &Config) -> Result<(), CliError> {
    let store = FileCredentialStore::open_read_only(&config.state_dir())?;
    let provisioned = store.is_provisioned()?;
    let credentials = store.load_credentials()?;
    let prov = &config.provisioning;

    println!("state file:    {}", store.path().display());
    println!("provisioned:   {}", if provisioned { "yes" } else { "no" });
    if let Some(credentials) = credentials {
        println!("ssid:          {}", credentials.ssid);
    }
    println!("transport:     {} ({})", prov.transport, prov.security);
    if prov.transport != TransportKind::Manual {
        println!(
            "service name:  {}",
            service_name(&prov.service_name_prefix, &config.hardware_address())
        );
    }
    println!("max retries:   {}", config.wifi.max_retry);
    Ok(())
}

pub fn erase(config: &Config) -> Result<(), CliError> {
    let store = FileCredentialStore::open(&config.state_dir())?;
    store.erase()?;
    println!("erased persisted provisioning state ({})", store.path().display());
    Ok(())
}
