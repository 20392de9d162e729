//! CLI module for exrun
//!
//! ```text
//! exrun [--show-patched] [-v] <FILE> [--run <EXPORT>]
//! ```
//!
//! ## Modules
//!
//! - `commands` - Command implementations (patch → load → execute → cleanup)
//! - `executor` - Batch execution and reporting
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod executor;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use executor::Selection;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Same status clap uses for usage errors
    pub const USAGE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Create a usage error (exit code 2).
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::USAGE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run the top-level functions of a JavaScript exercise file
#[derive(Parser, Debug)]
#[command(name = "exrun")]
#[command(version = VERSION)]
#[command(about = "Run the top-level functions of a JavaScript exercise file", long_about = None)]
pub struct Cli {
    /// Source file to load (relative to the current directory)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Run only the named function
    #[arg(long = "run", value_name = "EXPORT")]
    pub run: Option<String>,

    /// Print the patched module source before running it
    #[arg(long = "show-patched")]
    pub show_patched: bool,

    /// Verbose output (collection count, timings)
    #[arg(short, long)]
    pub verbose: bool,

    /// Anything else after FILE is an invalid command
    #[arg(value_name = "COMMAND", allow_hyphen_values = true, hide = true)]
    pub extra: Vec<String>,
}

impl Cli {
    /// Which exports to run, or an invalid-command error.
    pub fn selection(&self) -> CliResult<Selection> {
        if let Some(command) = self.extra.first() {
            return Err(CliError::usage(format!("Invalid command supplied: {}", command)));
        }
        Ok(match &self.run {
            Some(name) => Selection::Named(name.clone()),
            None => Selection::All,
        })
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let selection = cli.selection()?;
    let options = commands::RunOptions {
        show_patched: cli.show_patched,
        verbose: cli.verbose,
    };
    commands::run_file(&cli.file, &selection, options)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_file_only() {
        let cli = Cli::try_parse_from(["exrun", "exercises.js"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("exercises.js"));
        assert_eq!(cli.selection().unwrap(), Selection::All);
    }

    #[test]
    fn test_cli_parse_run_target() {
        let cli = Cli::try_parse_from(["exrun", "exercises.js", "--run", "exercise_01"]).unwrap();
        assert_eq!(
            cli.selection().unwrap(),
            Selection::Named("exercise_01".to_string())
        );
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::try_parse_from(["exrun", "--show-patched", "-v", "exercises.js"]).unwrap();
        assert!(cli.show_patched);
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_missing_file_is_usage_error() {
        let err = Cli::try_parse_from(["exrun"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_invalid_command() {
        let cli = Cli::try_parse_from(["exrun", "exercises.js", "--walk", "a"]).unwrap();
        let err = cli.selection().unwrap_err();
        assert_eq!(err.exit_code, ExitCode::USAGE);
        assert_eq!(err.message, "Invalid command supplied: --walk");
    }

    #[test]
    fn test_cli_invalid_positional_command() {
        let cli = Cli::try_parse_from(["exrun", "exercises.js", "all"]).unwrap();
        assert!(cli.selection().is_err());
    }
}
