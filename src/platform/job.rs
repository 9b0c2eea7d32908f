//! Runner and context bundle handed to platform hooks

use crate::executor::{
    CommandInvocation, CommandRunner, ExecutionContext, ExecutionTrace, within_directory,
};
use crate::pipeline::{PipelineError, Stage};
use std::path::Path;

/// The runner and the execution context of one run, handed to every hook
#[derive(Debug)]
pub struct BatchJob {
    runner: CommandRunner,
    context: ExecutionContext,
}

impl BatchJob {
    /// Creates a job over `runner` and `context`
    #[must_use]
    pub fn new(runner: CommandRunner, context: ExecutionContext) -> Self {
        Self { runner, context }
    }

    /// Runs a command under the current context.
    ///
    /// # Errors
    ///
    /// Fails when a fail-fast command exits non-zero or cannot start.
    pub fn run(&mut self, invocation: &CommandInvocation) -> Result<i32, PipelineError> {
        self.runner.execute(invocation, &self.context)
    }

    /// Runs a command and returns its exit code whatever it is.
    ///
    /// # Errors
    ///
    /// Fails only when the process cannot start.
    pub fn run_unless_error(&mut self, invocation: CommandInvocation) -> Result<i32, PipelineError> {
        self.run(&invocation.soft())
    }

    /// Labels subsequent commands with `stage`
    pub fn enter_stage(&mut self, stage: Stage) {
        tracing::info!(stage = %stage, "Entering stage");
        self.runner.set_stage(stage);
    }

    /// Shared execution context
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Mutable execution context
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    /// Commands executed so far
    #[must_use]
    pub fn trace(&self) -> &ExecutionTrace {
        self.runner.trace()
    }

    /// Runs `body` with the current directory switched to `path`, restoring
    /// it on every exit path.
    pub fn with_directory<T>(
        &mut self,
        path: impl AsRef<Path>,
        body: impl FnOnce(&mut Self) -> T,
    ) -> T {
        within_directory(self, Self::context_mut, path, body)
    }
}
