//! Config subcommand handlers.

use std::path::Path;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, path: Option<&Path>) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = path.map_or_else(devlink_config::config_path, Path::to_path_buf);
            println!("{}", path.display());
        }
        ConfigCommand::Show => {
            let config = crate::load_config(path)?;
            let rendered = config
                .redacted()
                .to_toml()
                .map_err(|source| crate::config_error(path, source))?;
            print!("{rendered}");
        }
    }
    Ok(())
}
