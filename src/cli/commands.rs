//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::path::Path;

use thiserror::Error;

use crate::frontend::patcher::{self, PatchError};
use crate::host::{self, LoadError};

use super::executor::{self, ConsoleReporter, RunReporter, RunSummary, Selection};
use super::{CliError, CliResult, ExitCode};

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Print the patched module before running it
    pub show_patched: bool,
    /// Show collection counts and per-function timings
    pub verbose: bool,
}

/// Errors that abort a run before or while loading the module.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Patch, load and run `file`, reporting through `reporter`.
///
/// The temp artifact is removed on every path out of this function once it
/// has been written.
#[tracing::instrument(skip_all, fields(file = %file.display()))]
pub fn execute_file(
    file: &Path,
    selection: &Selection,
    show_patched: bool,
    reporter: &mut dyn RunReporter,
) -> Result<RunSummary, RunError> {
    let (patched, artifact) = patcher::patch_file(file)?;
    if show_patched {
        println!("{}", patched.text);
    }

    let mut module = host::load(&artifact, &patched.declarations)?;
    let summary = executor::run_exports(&mut module, selection, reporter);
    drop(module);

    if let Err(e) = artifact.remove() {
        tracing::warn!(error = %e, "failed to remove patched module");
    }

    Ok(summary)
}

/// Run `file` with console output.
///
/// Exit status: failure when any invoked function failed, success otherwise
/// (including when the named target is unavailable).
pub fn run_file(file: &Path, selection: &Selection, options: RunOptions) -> CliResult<ExitCode> {
    let mut reporter = ConsoleReporter::new(options.verbose);
    let summary = execute_file(file, selection, options.show_patched, &mut reporter)
        .map_err(|e| CliError::failure(format!("Error: {}", e)))?;

    if summary.has_failures() {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
