//! Run a test command through the host and decide whether it passed.

use crate::host::{CommandOutput, Host};
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub passed: bool,
    /// Combined stdout and stderr.
    pub output: String,
    /// Reported exit code. Always `Some` once classified.
    pub exit_code: Option<i32>,
}

impl TestResult {
    /// Exit code for display, `1` when unknown and failing.
    #[must_use]
    pub fn display_code(&self) -> i32 {
        self.exit_code.unwrap_or(if self.passed { 0 } else { 1 })
    }
}

/// Output markers that mean at least one test failed.
const FAIL_INDICATORS: &[&str] = &[
    "test result: failed",
    "error[e",
    "panicked",
    "assertion failed",
    "assertionerror",
    "failures:",
];

fn has_nonzero_failed(text: &str) -> bool {
    Regex::new(r"\b0*[1-9]\d*\s*failed").is_ok_and(|re| re.is_match(text))
}

/// Decide pass/fail from test output alone.
///
/// A count of failed tests greater than zero fails the run even when the
/// output also reports passes. Otherwise pass markers are checked before
/// fail markers so that summaries such as `5 passed; 0 failed` count as
/// passing. With no marker either way, an empty stderr counts as a pass.
#[must_use]
pub fn detect_tests_passed(output: &str, stderr: &str) -> bool {
    let combined = format!("{} {}", output, stderr).to_lowercase();

    if has_nonzero_failed(&combined) {
        return false;
    }

    if combined.contains("test result: ok") {
        return true;
    }
    if Regex::new(r"\d+\s*passed.*\b0\s*failed").is_ok_and(|re| re.is_match(&combined)) {
        return true;
    }
    if combined.contains("passed") {
        return true;
    }

    if FAIL_INDICATORS.iter().any(|i| combined.contains(i)) {
        return false;
    }

    stderr.trim().is_empty()
}

/// Classify a finished command.
///
/// A reported exit code wins: non-zero fails, zero passes unless the output
/// still reports failures. Without an exit code the output heuristic decides.
#[must_use]
pub fn classify(result: &CommandOutput) -> TestResult {
    let output = result.combined();
    let passed = match result.exit_code {
        Some(0) => {
            let lower = output.to_lowercase();
            !has_nonzero_failed(&lower) && !lower.contains("test result: failed")
        }
        Some(_) => false,
        None => detect_tests_passed(&result.stdout, &result.stderr),
    };

    let exit_code = Some(result.exit_code.unwrap_or(if passed { 0 } else { 1 }));
    TestResult {
        passed,
        output,
        exit_code,
    }
}

/// Run `command` in `cwd` and classify the result.
///
/// A command that could not be started is a failed run whose output is the
/// error message.
pub async fn run_tests(host: &dyn Host, command: &str, cwd: &Path) -> TestResult {
    debug!(command, cwd = %cwd.display(), "Running tests");
    match host.subprocess(command, cwd).await {
        Ok(output) => classify(&output),
        Err(e) => {
            warn!(command, "Test command failed to run: {}", e);
            TestResult {
                passed: false,
                output: e.to_string(),
                exit_code: Some(1),
            }
        }
    }
}
