//! Batch executor
//!
//! Invokes the selected exports of a loaded module one at a time, in source
//! order, and collects pass/fail results for the run.
//!
//! ## Isolation
//!
//! A failing invocation is recorded and the batch moves on; one bad function
//! never stops its siblings from running.
//!
//! ## Seams
//!
//! - `ExportRunner` abstracts the loaded module (entries + invocation), so the
//!   selection and ordering rules are independent of the engine.
//! - `RunReporter` separates output from execution, in the same way as a
//!   pytest-style console reporter.

use std::fmt;
use std::time::{Duration, Instant};

use crate::frontend::patcher::DeclKind;

// ============================================================================
// Export runner
// ============================================================================

/// Name and shape of one export, as seen by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub kind: DeclKind,
}

/// A loaded module whose exports can be invoked by name.
pub trait ExportRunner {
    /// Exports in source declaration order.
    fn entries(&self) -> Vec<ExportEntry>;

    /// Call the export with no arguments and no `this`.
    fn invoke(&mut self, name: &str) -> Result<(), InvocationError>;
}

/// Error raised by an invoked export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationError {
    pub message: String,
    /// Stack trace, when the thrown value carried one
    pub trace: Option<String>,
}

impl InvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(trace) = &self.trace {
            write!(f, "\n{}", trace)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvocationError {}

// ============================================================================
// Selection and results
// ============================================================================

/// Which exports a run invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every function-like export
    All,
    /// Exactly one export
    Named(String),
}

/// Why a named target was not invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    NotFound,
    IsClass,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::NotFound => write!(f, "not found"),
            Unavailable::IsClass => write!(f, "is a class"),
        }
    }
}

/// Result of a single invocation
#[derive(Debug)]
pub enum TestResult {
    Passed(Duration),
    Failed(Duration, InvocationError),
}

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub passed: Vec<String>,
    pub failed: Vec<(String, InvocationError)>,
    /// Set when a named target could not be run; nothing was invoked then
    pub unavailable: Option<(String, Unavailable)>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|(name, _)| name.as_str()).collect()
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Trait for reporting run progress and results.
pub trait RunReporter {
    /// Called once the exports to invoke are known
    fn on_collection_complete(&mut self, _selected: usize) {}

    /// Called when a named target cannot be run
    fn on_target_unavailable(&mut self, name: &str, reason: Unavailable);

    /// Called before an export is invoked
    fn on_test_start(&mut self, name: &str);

    /// Called after an export returns or throws
    fn on_test_complete(&mut self, name: &str, result: &TestResult);

    /// Called when all invocations have completed
    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Default console reporter.
#[derive(Default)]
pub struct ConsoleReporter {
    pub verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunReporter for ConsoleReporter {
    fn on_collection_complete(&mut self, selected: usize) {
        if self.verbose {
            eprintln!("collected {} function(s)", selected);
        }
    }

    fn on_target_unavailable(&mut self, name: &str, reason: Unavailable) {
        println!("Function {} not found or is a class ({})", name, reason);
    }

    fn on_test_start(&mut self, name: &str) {
        println!("{}", "-".repeat(25));
        println!("Running {}:\n", name);
    }

    fn on_test_complete(&mut self, name: &str, result: &TestResult) {
        match result {
            TestResult::Passed(d) => {
                if self.verbose {
                    println!("{} \x1b[32mpassed\x1b[0m ({:.0}ms)\n", name, d.as_millis());
                } else {
                    println!("{} \x1b[32mpassed\x1b[0m\n", name);
                }
            }
            TestResult::Failed(d, error) => {
                if self.verbose {
                    println!("{} \x1b[31mfailed\x1b[0m ({:.0}ms)\n", name, d.as_millis());
                } else {
                    println!("{} \x1b[31mfailed\x1b[0m\n", name);
                }
                eprintln!("\x1b[31m{}\x1b[0m", error);
            }
        }
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        println!("Passed functions: [{}]", summary.passed.join(", "));
        println!("Failed functions: [{}]", summary.failed_names().join(", "));

        let mut parts = Vec::new();
        if !summary.passed.is_empty() {
            parts.push(format!("\x1b[32m{} passed\x1b[0m", summary.passed.len()));
        }
        if !summary.failed.is_empty() {
            parts.push(format!("\x1b[31m{} failed\x1b[0m", summary.failed.len()));
        }
        if parts.is_empty() {
            parts.push("no functions run".to_string());
        }

        println!(
            "====== {} in {:.2}s ======",
            parts.join(", "),
            summary.duration.as_secs_f64()
        );
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Resolve `selection` against the runner's entries.
///
/// Class-like exports are never selected.
fn select(entries: &[ExportEntry], selection: &Selection) -> Result<Vec<String>, (String, Unavailable)> {
    match selection {
        Selection::All => Ok(entries
            .iter()
            .filter(|e| !e.kind.is_class())
            .map(|e| e.name.clone())
            .collect()),
        Selection::Named(target) => match entries.iter().find(|e| &e.name == target) {
            None => Err((target.clone(), Unavailable::NotFound)),
            Some(entry) if entry.kind.is_class() => Err((target.clone(), Unavailable::IsClass)),
            Some(entry) => Ok(vec![entry.name.clone()]),
        },
    }
}

/// Run the selected exports and return the collected results.
#[tracing::instrument(skip_all, fields(selection = ?selection))]
pub fn run_exports(
    runner: &mut dyn ExportRunner,
    selection: &Selection,
    reporter: &mut dyn RunReporter,
) -> RunSummary {
    let start_time = Instant::now();
    let mut summary = RunSummary::default();

    let selected = match select(&runner.entries(), selection) {
        Ok(selected) => selected,
        Err((name, reason)) => {
            reporter.on_target_unavailable(&name, reason);
            summary.unavailable = Some((name, reason));
            Vec::new()
        }
    };
    reporter.on_collection_complete(selected.len());

    for name in selected {
        reporter.on_test_start(&name);

        let start = Instant::now();
        let result = match runner.invoke(&name) {
            Ok(()) => TestResult::Passed(start.elapsed()),
            Err(error) => TestResult::Failed(start.elapsed(), error),
        };
        reporter.on_test_complete(&name, &result);

        match result {
            TestResult::Passed(_) => summary.passed.push(name),
            TestResult::Failed(_, error) => {
                tracing::debug!(name = %name, error = %error.message, "invocation failed");
                summary.failed.push((name, error));
            }
        }
    }

    summary.duration = start_time.elapsed();
    reporter.on_run_complete(&summary);
    summary
}

// ============================================================================
// Tests
// ============================================================================
