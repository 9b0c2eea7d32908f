//! Windows job hooks
//!
//! Windows builds need the Visual Studio toolchain environment, which only
//! exists inside a `cmd` session that has run `vcvarsall.bat`. `setup_env`
//! writes an `env.bat` wrapper that prepares that session and then runs its
//! arguments, and routes every later command through it.

use super::{BatchJob, PlatformJob, TargetOs};
use crate::executor::CommandInvocation;
use crate::pipeline::PipelineError;
use std::path::PathBuf;

const ENV_WRAPPER: &str = "env.bat";
const CONNEXT_ENV_SCRIPT: &str = r"rti_connext_dds-5.3.1\resource\scripts\rtisetenv_x64Win64VS2015.bat";

/// Windows batch job
#[derive(Debug, Clone, Default)]
pub struct WindowsJob {
    connext_env_script: Option<PathBuf>,
}

impl WindowsJob {
    /// Creates the Windows variant, optionally building with Connext
    #[must_use]
    pub fn new(connext: bool) -> Self {
        let program_files =
            std::env::var("ProgramFiles").unwrap_or_else(|_| r"C:\Program Files".to_string());
        Self {
            connext_env_script: connext
                .then(|| PathBuf::from(program_files).join(CONNEXT_ENV_SCRIPT)),
        }
    }

    /// Overrides where the Connext environment script is looked up
    #[must_use]
    pub fn with_connext_env_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.connext_env_script = Some(script.into());
        self
    }

    fn env_wrapper(&self) -> String {
        let mut lines = vec![
            "@echo off".to_string(),
            r#"call "%VS140COMNTOOLS%..\..\VC\vcvarsall.bat" x86_amd64"#.to_string(),
        ];
        match &self.connext_env_script {
            Some(script) if script.exists() => {
                lines.push(format!("call \"{}\"", script.display()));
            }
            Some(script) => tracing::warn!(
                script = %script.display(),
                "Asked to use Connext but the RTI env script was not found"
            ),
            None => {}
        }
        lines.push("%*".to_string());
        lines.push("if %ERRORLEVEL% NEQ 0 exit /b %ERRORLEVEL%".to_string());
        lines.join("\r\n") + "\r\n"
    }
}

impl PlatformJob for WindowsJob {
    fn os(&self) -> TargetOs {
        TargetOs::Windows
    }

    fn pre(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        // vcs and friends only emit ANSI colours when they think they run
        // under ConEmu.
        job.context_mut().set_env("ConEmuANSI", "ON");
        Ok(())
    }

    fn show_env(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        job.run(&CommandInvocation::new("set").shell(true))?;
        job.run(&CommandInvocation::interpreter().args(["-m", "pip", "freeze"]))?;
        Ok(())
    }

    fn setup_env(&self, job: &mut BatchJob) -> Result<(), PipelineError> {
        let wrapper = job.context().resolve(ENV_WRAPPER);
        std::fs::write(&wrapper, self.env_wrapper())?;
        tracing::info!(path = %wrapper.display(), "Wrote environment wrapper");

        let mut prefix = job.context().run_prefix().to_vec();
        prefix.push(ENV_WRAPPER.to_string());
        job.context_mut().push_run_prefix(prefix);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedSpawner, batch_job};

    #[test]
    fn test_pre_enables_ansi_emulation() {
        let spawner = ScriptedSpawner::default();
        let mut job = batch_job(std::path::Path::new("/ws"), &spawner);

        WindowsJob::new(false).pre(&mut job).unwrap();

        assert_eq!(job.context().get_env("ConEmuANSI").map(String::as_str), Some("ON"));
        assert!(spawner.command_lines().is_empty());
    }

    #[test]
    fn test_setup_env_writes_wrapper_and_routes_commands() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = ScriptedSpawner::default();
        let mut job = batch_job(dir.path(), &spawner);

        WindowsJob::new(false).setup_env(&mut job).unwrap();

        let wrapper = std::fs::read_to_string(dir.path().join("env.bat")).unwrap();
        assert!(wrapper.starts_with("@echo off\r\n"));
        assert!(wrapper.contains("vcvarsall.bat"));
        assert!(wrapper.contains("%*\r\n"));
        assert_eq!(job.context().run_prefix(), ["env.bat".to_string()]);

        job.run(&CommandInvocation::new("vcs").arg("log")).unwrap();
        let spec = &spawner.calls.borrow()[0];
        assert!(spec.shell);
        assert_eq!(spec.command_line, "env.bat vcs log");
    }

    #[test]
    fn test_wrapper_calls_connext_script_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rtisetenv.bat");
        std::fs::write(&script, "").unwrap();

        let wrapper = WindowsJob::new(true)
            .with_connext_env_script(&script)
            .env_wrapper();
        assert!(wrapper.contains(&format!("call \"{}\"", script.display())));
    }
}
