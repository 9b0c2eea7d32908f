//! Linux job hooks

use super::{BatchJob, PlatformJob, TargetOs, source_env_script};
use crate::executor::CommandInvocation;
use crate::pipeline::PipelineError;
use std::path::PathBuf;

const CONNEXT_ENV_SCRIPT: &str =
    "/opt/rti.com/rti_connext_dds-5.3.1/resource/scripts/rtisetenv_x64Linux3gcc5.4.0.bash";

/// Linux batch job
///
/// Linux jobs run on disposable cloud machines or containers, so there is
/// nothing to clean up beforehand, and the image is expected to ship a
/// usable `virtualenv` already.
#[derive(Debug, Clone, Default)]
pub struct LinuxJob {
    connext_env_script: Option<PathBuf>,
}

impl LinuxJob {
    /// Creates the Linux variant, optionally building with Connext
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

impl PlatformJob for LinuxJob {
    fn os(&self) -> TargetOs {
        TargetOs::Linux
    }

    fn pre(&self, _job: &mut BatchJob) -> Result<(), PipelineError> {
        tracing::debug!("No Linux pre-steps required");
        Ok(())
    }

    fn show_env(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        job.run(&CommandInvocation::new("export").shell(true))?;
        job.run(&CommandInvocation::interpreter().args(["-m", "pip", "freeze"]))?;
        Ok(())
    }

    fn setup_env(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        if let Some(script) = &self.connext_env_script {
            if script.exists() {
                source_env_script(job, script);
            } else {
                tracing::warn!(
                    script = %script.display(),
                    "Asked to use Connext but the RTI env script was not found"
                );
            }
        }
        Ok(())
    }

    fn can_install_isolation_tool(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedSpawner, batch_job};

    #[test]
    fn test_show_env_prints_exports_and_pip_freeze() {
        let spawner = ScriptedSpawner::default();
        let mut job = batch_job(std::path::Path::new("/ws"), &spawner);

        LinuxJob::new(false).show_env(&mut job).unwrap();

        assert_eq!(spawner.command_lines(), vec!["export", "python3 -m pip freeze"]);
        assert!(spawner.calls.borrow()[0].shell);
    }

    #[test]
    fn test_setup_env_sources_existing_connext_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rtisetenv.bash");
        std::fs::write(&script, "").unwrap();
        let spawner = ScriptedSpawner::default();
        let mut job = batch_job(dir.path(), &spawner);

        LinuxJob::new(true)
            .with_connext_env_script(&script)
            .setup_env(&mut job)
            .unwrap();

        let prefix = job.context().run_prefix();
        assert_eq!(prefix.len(), 3);
        assert_eq!(prefix[0], ".");
        assert_eq!(prefix[2], "&&");
    }

    #[test]
    fn test_setup_env_ignores_missing_connext_script() {
        let spawner = ScriptedSpawner::default();
        let mut job = batch_job(std::path::Path::new("/ws"), &spawner);

        LinuxJob::new(true)
            .with_connext_env_script("/nonexistent/rtisetenv.bash")
            .setup_env(&mut job)
            .unwrap();

        assert!(job.context().run_prefix().is_empty());
    }

    #[test]
    fn test_connext_script_composes_after_existing_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rtisetenv.bash");
        std::fs::write(&script, "").unwrap();
        let spawner = ScriptedSpawner::default();
        let mut job = batch_job(dir.path(), &spawner);
        job.context_mut()
            .push_run_prefix(vec![".".into(), "\"venv/bin/activate\"".into(), "&&".into()]);

        LinuxJob::default()
            .with_connext_env_script(&script)
            .setup_env(&mut job)
            .unwrap();

        let prefix = job.context().run_prefix();
        assert_eq!(prefix.len(), 6);
        assert_eq!(prefix[1], "\"venv/bin/activate\"");
    }
}
