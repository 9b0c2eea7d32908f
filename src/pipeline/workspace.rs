//! The batch job orchestrator
//!
//! [`WorkspacePipeline`] runs a fixed sequence of stages over one
//! [`BatchJob`] and one [`PlatformJob`]:
//!
//! 1. init (in [`WorkspacePipeline::new`]), workspace prep, platform pre,
//!    environment diagnostics, isolation tool install;
//! 2. inside the workspace: virtualenv activation, toolchain update,
//!    dependency install, manifest fetch, source checkout, branch override,
//!    revision log, platform environment setup;
//! 3. build, test and result collection, or the packaging steps instead.
//!
//! Fail-fast stages propagate [`PipelineError`] with `?`, so nothing after a
//! fatal failure runs. Branch override, build, test and result collection are
//! soft: their exit codes land in the [`BatchReport`] and the run goes on.

use super::config::JobConfiguration;
use super::errors::PipelineError;
use super::hooks::{BuildFailureHook, LogOnly};
use super::types::{BatchReport, Stage, StageResult};
use crate::executor::{CommandInvocation, CommandRunner, ExecutionContext, ExecutionTrace};
use crate::platform::{BatchJob, PlatformJob, TargetOs, platform_job};
use std::fs;
use std::path::{Path, PathBuf};

/// File the manifest is downloaded to, inside the workspace
pub const MANIFEST_FILE: &str = "ros2.repos";

/// Directory of the virtualenv, inside the workspace
pub const VENV_DIR: &str = "venv";

/// Orchestrates one batch run
pub struct WorkspacePipeline {
    config: JobConfiguration,
    platform: Box<dyn PlatformJob>,
    job: BatchJob,
    on_build_failure: Box<dyn BuildFailureHook>,
    report: BatchReport,
}

impl std::fmt::Debug for WorkspacePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspacePipeline")
            .field("config", &self.config)
            .field("os", &self.platform.os())
            .field("job", &self.job)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl WorkspacePipeline {
    /// Init stage: validates the configuration and selects the platform.
    ///
    /// `base_dir` is where the workspace root is created. Nothing is touched
    /// and nothing runs before validation passes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] for invalid combinations.
    pub fn new(
        config: JobConfiguration,
        runner: CommandRunner,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let run_id = uuid::Uuid::new_v4();
        tracing::info!(run_id = %run_id, "Batch job called with args:");
        for (name, value) in config.describe() {
            tracing::info!("  - {name}={value}");
        }

        let mut context = ExecutionContext::new(base_dir, &config.python_interpreter);
        if std::env::var_os("TERM").is_none() {
            // Coerces make into coloured output.
            context.set_env("TERM", "xterm-256color");
        }

        let platform = platform_job(config.os, config.connext);
        let mut report = BatchReport::default();
        report.record(Stage::Init, StageResult::Success, None);

        Ok(Self {
            config,
            platform,
            job: BatchJob::new(runner, context),
            on_build_failure: Box::new(LogOnly),
            report,
        })
    }

    /// Replaces the platform variant selected from the configuration
    #[must_use]
    pub fn with_platform(mut self, platform: Box<dyn PlatformJob>) -> Self {
        self.platform = platform;
        self
    }

    /// Replaces the default log-only build failure hook
    #[must_use]
    pub fn with_build_failure_hook(mut self, hook: Box<dyn BuildFailureHook>) -> Self {
        self.on_build_failure = hook;
        self
    }

    /// Configuration of this run
    #[must_use]
    pub fn config(&self) -> &JobConfiguration {
        &self.config
    }

    /// Stage outcomes so far; complete once `run` returns
    #[must_use]
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    /// Every command executed so far
    #[must_use]
    pub fn trace(&self) -> &ExecutionTrace {
        self.job.trace()
    }

    /// Execution context as left by the last stage
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        self.job.context()
    }

    /// Runs the batch job: setup, build, test, result collection.
    ///
    /// Returns 0 once every stage has run, whatever the soft stages
    /// returned; their codes are in [`report`](Self::report).
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure.
    pub fn run(&mut self) -> Result<i32, PipelineError> {
        self.execute(|stages, job| stages.build_and_test(job))
    }

    /// Runs the shared setup, then `tail` inside the workspace
    pub(crate) fn execute(
        &mut self,
        tail: impl FnOnce(&mut Stages<'_>, &mut BatchJob) -> Result<(), PipelineError>,
    ) -> Result<i32, PipelineError> {
        let Self {
            config,
            platform,
            job,
            on_build_failure,
            report,
        } = self;
        let config: &JobConfiguration = config;
        let mut stages = Stages {
            config,
            platform: &**platform,
            on_build_failure,
            report,
        };

        let outcome = stages.prepare(job).and_then(|()| {
            job.with_directory(&config.layout.workspace, |job| {
                stages.setup_sources(job)?;
                tail(&mut stages, job)
            })
        });

        // Soft failures are reported in the summary, not through the exit code.
        stages.report.exit_code = match &outcome {
            Ok(()) => 0,
            Err(err) => i32::from(err.exit_code()),
        };
        outcome.map(|()| stages.report.exit_code)
    }
}

/// Borrowed view of a pipeline while its stages run
pub(crate) struct Stages<'a> {
    pub(crate) config: &'a JobConfiguration,
    pub(crate) platform: &'a dyn PlatformJob,
    pub(crate) on_build_failure: &'a mut Box<dyn BuildFailureHook>,
    pub(crate) report: &'a mut BatchReport,
}

impl Stages<'_> {
    /// Runs a fail-fast stage and records how it ended
    pub(crate) fn fatal<T>(
        &mut self,
        job: &mut BatchJob,
        stage: Stage,
        body: impl FnOnce(&mut BatchJob) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        job.enter_stage(stage);
        match body(job) {
            Ok(value) => {
                self.report.record(stage, StageResult::Success, None);
                Ok(value)
            }
            Err(err) => {
                let code = match &err {
                    PipelineError::FatalCommand { code, .. } => Some(*code),
                    _ => None,
                };
                self.report.record(stage, StageResult::Failure, code);
                Err(err)
            }
        }
    }

    /// Runs a single soft command as a stage and returns its exit code
    pub(crate) fn soft(
        &mut self,
        job: &mut BatchJob,
        stage: Stage,
        invocation: CommandInvocation,
    ) -> Result<i32, PipelineError> {
        job.enter_stage(stage);
        let code = job.run_unless_error(invocation)?;
        self.report
            .record(stage, StageResult::from_soft_exit(code), Some(code));
        Ok(code)
    }

    pub(crate) fn skip(&mut self, stage: Stage, reason: &str) {
        tracing::info!(stage = %stage, reason, "Skipping stage");
        self.report.record(stage, StageResult::Skipped, None);
    }

    /// Stages before entering the workspace
    fn prepare(&mut self, job: &mut BatchJob) -> Result<(), PipelineError> {
        let platform = self.platform;
        let workspace = job.context().resolve(&self.config.layout.workspace);

        self.fatal(job, Stage::WorkspacePrep, |_| {
            tracing::info!(workspace = %workspace.display(), "Using workspace");
            clean_workspace(&workspace)
        })?;
        self.fatal(job, Stage::PlatformPre, |job| platform.pre(job))?;
        self.fatal(job, Stage::EnvDiagnostics, |job| platform.show_env(job))?;

        if platform.can_install_isolation_tool() {
            self.fatal(job, Stage::PrereqInstall, |job| {
                job.run(
                    &CommandInvocation::interpreter().args(["-m", "pip", "install", "-U", "virtualenv"]),
                )
            })?;
        } else {
            // Needs elevated privileges here; the host image must provide it.
            self.skip(Stage::PrereqInstall, "virtualenv is expected on the host");
        }
        Ok(())
    }

    /// Stages inside the workspace up to and including environment setup
    fn setup_sources(&mut self, job: &mut BatchJob) -> Result<(), PipelineError> {
        let config = self.config;
        let platform = self.platform;

        if config.do_venv {
            self.fatal(job, Stage::EnvActivation, |job| {
                activate_venv(job, config.os)?;
                platform.show_env(job)
            })?;
        } else {
            self.skip(Stage::EnvActivation, "--do-venv not given");
        }

        self.fatal(job, Stage::ToolchainUpdate, |job| {
            job.run(&CommandInvocation::interpreter().args([
                "-m", "pip", "install", "-U", "pip", "setuptools",
            ]))?;
            job.run_unless_error(
                CommandInvocation::interpreter()
                    .args(["-c", "import setuptools; print(setuptools.__version__)"]),
            )?;
            job.run_unless_error(CommandInvocation::interpreter().args(["-m", "pip", "--version"]))
        })?;

        self.fatal(job, Stage::DependencyInstall, |job| {
            job.run(
                &CommandInvocation::interpreter()
                    .args(["-m", "pip", "install", "-U"])
                    .args(config.pip_dependencies.iter().cloned()),
            )
        })?;

        self.fatal(job, Stage::ManifestFetch, |job| {
            job.run(&CommandInvocation::new("curl").args([
                "-sk",
                config.repo_file_url.as_str(),
                "-o",
                MANIFEST_FILE,
            ]))?;
            let manifest = fs::read_to_string(job.context().resolve(MANIFEST_FILE))?;
            tracing::info!("Contents of `{MANIFEST_FILE}`:\n{manifest}");
            Ok(())
        })?;

        self.fatal(job, Stage::SourceCheckout, |job| {
            fs::create_dir_all(job.context().resolve(&config.layout.source))?;
            job.run(&CommandInvocation::new("vcs").args([
                "import",
                config.layout.source.as_str(),
                "--input",
                MANIFEST_FILE,
            ]))
        })?;

        match &config.test_branch {
            Some(branch) => {
                tracing::info!("Attempting to switch all repositories to the '{branch}' branch");
                let checkout = CommandInvocation::new("vcs")
                    .args(["custom", ".", "--args", "checkout"])
                    .arg(branch.as_str());
                let line = checkout.to_string();
                let code = self.soft(job, Stage::BranchOverride, checkout)?;
                tracing::info!("'{line}' returned exit code '{code}'");
            }
            None => self.skip(Stage::BranchOverride, "no --test-branch given"),
        }

        self.fatal(job, Stage::RevisionLog, |job| {
            job.run(&CommandInvocation::new("vcs").args([
                "log",
                "-l1",
                config.layout.source.as_str(),
            ]))
        })?;

        self.fatal(job, Stage::PlatformSetupEnv, |job| platform.setup_env(job))
    }

    /// Build, test and result collection; all soft
    fn build_and_test(&mut self, job: &mut BatchJob) -> Result<(), PipelineError> {
        let config = self.config;
        let layout = &config.layout;

        let build = build_tool(&layout.source)
            .args(["build", "--build-tests"])
            .args(["--build-space", layout.build.as_str()])
            .args(["--install-space", layout.install.as_str()])
            .arg(layout.source.as_str());
        let ret_build = self.soft(job, Stage::Build, build)?;
        if ret_build != 0 {
            self.on_build_failure.on_build_failure(ret_build, job.context());
        }

        let test = build_tool(&layout.source)
            .arg("test")
            .args(["--build-space", layout.build.as_str()])
            .args(["--install-space", layout.install.as_str()])
            // Built and installed above already.
            .args(["--skip-build", "--skip-install"])
            .arg(layout.source.as_str());
        let ret_test = self.soft(job, Stage::Test, test)?;
        tracing::info!("ament.py test returned: '{ret_test}'");

        let results = build_tool(&layout.source)
            .arg("test_results")
            .arg(layout.build.as_str());
        let ret_results = self.soft(job, Stage::ResultsCollection, results)?;
        tracing::info!("ament.py test_results returned: '{ret_results}'");
        Ok(())
    }
}

/// Interpreter invocation of the build tool script in `source`
pub(crate) fn build_tool(source: &str) -> CommandInvocation {
    let script = Path::new(".")
        .join(source)
        .join("ament")
        .join("ament_tools")
        .join("scripts")
        .join("ament.py");
    CommandInvocation::interpreter()
        .arg("-u")
        .arg(script.to_string_lossy().into_owned())
}

/// Removes `workspace` with all its contents and recreates it empty
fn clean_workspace(workspace: &Path) -> Result<(), PipelineError> {
    if workspace.exists() {
        tracing::debug!(path = %workspace.display(), "Removing previous workspace");
        fs::remove_dir_all(workspace)?;
    }
    fs::create_dir_all(workspace)?;
    Ok(())
}

/// Activation prefix and interpreter of the virtualenv at `venv`
fn venv_paths(os: TargetOs, venv: &Path) -> (Vec<String>, PathBuf) {
    match os {
        TargetOs::Windows => (
            vec![format!("\"{}\"", venv.join("Scripts").join("activate.bat").display()), "&&".to_string()],
            venv.join("Scripts").join("python.exe"),
        ),
        TargetOs::Linux | TargetOs::Osx => (
            vec![
                ".".to_string(),
                shell_words::quote(&venv.join("bin").join("activate").to_string_lossy()).into_owned(),
                "&&".to_string(),
            ],
            venv.join("bin").join("python"),
        ),
    }
}

/// Creates the virtualenv and switches the context over to it
fn activate_venv(job: &mut BatchJob, os: TargetOs) -> Result<(), PipelineError> {
    let host = job.context().interpreter().to_string_lossy().into_owned();
    job.run(
        &CommandInvocation::interpreter()
            .args(["-m", "virtualenv", "-p"])
            .arg(host)
            .arg(VENV_DIR),
    )?;

    let (prefix, python) = venv_paths(os, &job.context().resolve(VENV_DIR));
    let context = job.context_mut();
    context.push_run_prefix(prefix);
    context.push_interpreter(python);
    Ok(())
}
