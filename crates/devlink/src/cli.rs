//! Clap derive structures for the `devlink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// devlink -- connectivity bring-up and lifecycle runtime
#[derive(Debug, Parser)]
#[command(
    name = "devlink",
    version,
    about = "Bring a device from unprovisioned to connected and keep it there",
    long_about = "Runs the devlink connectivity coordinator on a host.\n\n\
        Producer events (link, IP, provisioning) are read from a script or stdin,\n\
        one per line, and drive the same state machine the device firmware runs.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "DEVLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Boot the device runtime and feed it producer events
    Run(RunArgs),

    /// Show persisted provisioning state
    Status,

    /// Erase persisted credentials and the provisioned flag
    Erase,

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Event script to replay instead of reading stdin
    ///
    /// One event per line: link-started, disconnected <reason>,
    /// got-ip <ipv4>, prov-started, creds <ssid> <secret>,
    /// prov-failed auth|ap-not-found, prov-success, prov-end,
    /// message text|binary <payload>, method <name> <json>,
    /// factory-reset, sleep <ms>. `#` starts a comment.
    #[arg(long, short = 's')]
    pub script: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration with secrets masked
    Show,

    /// Print the default configuration file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
