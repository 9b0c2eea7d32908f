//! What happens when the build stage fails
//!
//! A failed build does not stop the run: tests and result collection still
//! execute so their logs are available. Before continuing, the pipeline hands
//! control to a [`BuildFailureHook`] so an operator can be alerted or can
//! inspect the workspace while it is still in its failed state.

use crate::executor::ExecutionContext;
use std::io::{self, BufRead, Write};

/// Called once when the build stage exits non-zero
pub trait BuildFailureHook {
    /// `exit_code` is the build tool's status
    fn on_build_failure(&mut self, exit_code: i32, context: &ExecutionContext);
}

/// Logs the failure and carries on
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnly;

impl BuildFailureHook for LogOnly {
    fn on_build_failure(&mut self, exit_code: i32, context: &ExecutionContext) {
        tracing::warn!(
            exit_code,
            workspace = %context.current_dir().display(),
            "Build failed, continuing with tests"
        );
    }
}

/// Blocks until the operator acknowledges the failure
#[derive(Debug)]
pub struct WaitForOperator<R> {
    input: R,
}

impl WaitForOperator<io::StdinLock<'static>> {
    /// Waits on standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> WaitForOperator<R> {
    /// Waits on `input`
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> BuildFailureHook for WaitForOperator<R> {
    fn on_build_failure(&mut self, exit_code: i32, context: &ExecutionContext) {
        tracing::warn!(
            exit_code,
            workspace = %context.current_dir().display(),
            "Build failed, pausing for operator inspection"
        );
        print!("Build failed with exit code {exit_code}. Press Enter to continue with tests... ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if let Err(e) = self.input.read_line(&mut line) {
            tracing::warn!(error = %e, "Could not read operator input, continuing");
        }
    }
}
