//! Scripted process spawner for unit tests

use crate::executor::{
    CommandOutput, CommandRunner, ExecutionContext, HostShell, ProcessSpawner, ProcessSpec,
};
use crate::pipeline::PipelineError;
use crate::platform::BatchJob;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Records every spec and answers with scripted exit codes
#[derive(Clone, Default)]
pub struct ScriptedSpawner {
    pub calls: Rc<RefCell<Vec<ProcessSpec>>>,
    failures: Vec<(String, i32)>,
}

impl ScriptedSpawner {
    /// Commands whose line contains `needle` exit with `code`
    pub fn fail_when(mut self, needle: &str, code: i32) -> Self {
        self.failures.push((needle.to_string(), code));
        self
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|s| s.command_line.clone()).collect()
    }
}

impl ProcessSpawner for ScriptedSpawner {
    fn spawn(&mut self, spec: &ProcessSpec) -> Result<CommandOutput, PipelineError> {
        self.calls.borrow_mut().push(spec.clone());
        let exit_code = self
            .failures
            .iter()
            .find(|(needle, _)| spec.command_line.contains(needle.as_str()))
            .map_or(0, |(_, code)| *code);
        Ok(CommandOutput {
            exit_code,
            ..CommandOutput::default()
        })
    }
}

pub fn batch_job(dir: &Path, spawner: &ScriptedSpawner) -> BatchJob {
    let runner = CommandRunner::new(Box::new(spawner.clone())).with_shell(HostShell::Posix);
    BatchJob::new(runner, ExecutionContext::new(dir, "python3"))
}
