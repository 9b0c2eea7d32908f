//! macOS job hooks

use super::{BatchJob, PlatformJob, TargetOs, source_env_script};
use crate::executor::CommandInvocation;
use crate::pipeline::PipelineError;
use std::path::PathBuf;

const CONNEXT_ENV_SCRIPT: &str =
    "/Applications/rti_connext_dds-5.3.1/resource/scripts/rtisetenv_x64Darwin16clang8.0.bash";

/// macOS batch job
#[derive(Debug, Clone, Default)]
pub struct MacOsJob {
    connext_env_script: Option<PathBuf>,
}

impl MacOsJob {
    /// Creates the macOS variant, optionally building with Connext
    #[must_use]
    pub fn new(connext: bool) -> Self {
        Self {
            connext_env_script: connext.then(|| PathBuf::from(CONNEXT_ENV_SCRIPT)),
        }
    }

    /// Overrides where the Connext environment script is looked up
    #[must_use]
    pub fn with_connext_env_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.connext_env_script = Some(script.into());
        self
    }
}

impl PlatformJob for MacOsJob {
    fn os(&self) -> TargetOs {
        TargetOs::Osx
    }

    fn pre(&self, _job: &mut BatchJob) -> Result<(), PipelineError> {
        Ok(())
    }

    fn show_env(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        job.run(&CommandInvocation::new("export").shell(true))?;
        job.run(&CommandInvocation::new("brew").args(["list", "--versions"]))?;
        job.run(&CommandInvocation::interpreter().args(["-m", "pip", "freeze"]))?;
        Ok(())
    }

    fn setup_env(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        match &self.connext_env_script {
            Some(script) if script.exists() => source_env_script(job, script),
            Some(script) => tracing::warn!(
                script = %script.display(),
                "Asked to use Connext but the RTI env script was not found"
            ),
            None => {}
        }
        Ok(())
    }
}
