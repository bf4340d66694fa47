mod cli;
mod commands;
mod error;
mod host;
mod script;

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use devlink_config::{Config, ConfigError};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.global.config.as_deref();

    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "devlink", &mut std::io::stdout());
            Ok(())
        }

        Command::Config(ref args) => commands::config_cmd::handle(args, config_path),

        Command::Status => commands::state::status(&load_config(config_path)?),

        Command::Erase => commands::state::erase(&load_config(config_path)?),

        Command::Run(args) => {
            let config = load_config(config_path)?;
            tracing::debug!(?args, "dispatching run");
            commands::run::handle(args, &config).await
        }
    }
}

/// Load configuration, attaching the file path to any failure.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config, CliError> {
    devlink_config::load_config(path).map_err(|source| config_error(path, source))
}

pub(crate) fn config_error(path: Option<&Path>, source: ConfigError) -> CliError {
    let path = path.map_or_else(devlink_config::config_path, Path::to_path_buf);
    CliError::Config {
        path: path.display().to_string(),
        source,
    }
}
