//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use devlink_config::ConfigError;
use devlink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const STORAGE: i32 = 4;
    pub const STARTUP: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid configuration")]
    #[diagnostic(
        code(devlink::config),
        help(
            "Check the config file ({path}) and any DEVLINK_* environment variables.\n\
             Run: devlink config show"
        )
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    // ── Persisted state ──────────────────────────────────────────────

    #[error("Persisted state unavailable: {message}")]
    #[diagnostic(
        code(devlink::storage),
        help("Check storage.state_dir, or reset it with: devlink erase")
    )]
    Storage { message: String },

    // ── Startup ──────────────────────────────────────────────────────

    #[error("Device cannot start: {message}")]
    #[diagnostic(
        code(devlink::startup),
        help("The device halts here; firmware would reboot.")
    )]
    Startup { message: String },

    // ── Script input ─────────────────────────────────────────────────

    #[error("Event script line {line}: {reason}")]
    #[diagnostic(
        code(devlink::script),
        help("See `devlink run --help` for the event syntax.")
    )]
    Script { line: usize, reason: String },

    // ── Runtime ──────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(devlink::core))]
    Core(CoreError),

    #[error("Runtime task failed: {message}")]
    #[diagnostic(code(devlink::runtime))]
    Runtime { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => exit_code::CONFIG,
            Self::Storage { .. } => exit_code::STORAGE,
            Self::Startup { .. } => exit_code::STARTUP,
            Self::Script { .. } => exit_code::USAGE,
            Self::Core(_) | Self::Runtime { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Storage { message } => CliError::Storage { message },
            err @ CoreError::TransportActivation { .. } => CliError::Startup {
                message: err.to_string(),
            },
            CoreError::Config { message } => CliError::Config {
                path: "(resolved)".into(),
                source: ConfigError::Validation {
                    field: "config".into(),
                    reason: message,
                },
            },
            other => CliError::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_distinct_exit_codes() {
        let storage = CliError::from(CoreError::Storage {
            message: "read-only".into(),
        });
        assert_eq!(storage.exit_code(), exit_code::STORAGE);

        let startup = CliError::from(CoreError::TransportActivation {
            transport: "soft-ap".into(),
            reason: "no memory".into(),
        });
        assert_eq!(startup.exit_code(), exit_code::STARTUP);

        let config = CliError::from(CoreError::Config {
            message: "bad".into(),
        });
        assert_eq!(config.exit_code(), exit_code::CONFIG);

        assert_eq!(
            CliError::from(CoreError::NotConnected).exit_code(),
            exit_code::GENERAL
        );
    }
}
