//! Command execution
//!
//! [`CommandRunner`] turns a [`CommandInvocation`] into a concrete process
//! under an [`ExecutionContext`]:
//!
//! - the context's run prefix is prepended (and forces shell mode),
//! - the active interpreter is substituted for [`Program::Interpreter`],
//! - context environment overrides are laid over the inherited environment,
//! - the child runs from the context's current directory,
//! - a non-zero exit is fatal unless the invocation opted out.
//!
//! Spawning itself goes through the [`ProcessSpawner`] trait so the
//! orchestration can be exercised without touching real tools.
//!
//! [`Program::Interpreter`]: super::Program::Interpreter

use super::context::ExecutionContext;
use super::invocation::{CommandInvocation, HostShell};
use super::trace::{ExecutionTrace, TraceEntry};
use crate::pipeline::{PipelineError, Stage};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// A fully resolved process, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program followed by its arguments
    pub argv: Vec<String>,
    /// Line announced in the log
    pub command_line: String,
    /// Whether `argv` wraps a shell line
    pub shell: bool,
    /// Directory to run from
    pub current_dir: PathBuf,
    /// Overrides laid over the inherited environment
    pub env: BTreeMap<String, String>,
}

/// Output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was killed by a signal
    pub exit_code: i32,
    /// Lines of merged stdout and stderr streamed to the console
    pub lines: usize,
    /// Wall-clock duration
    pub duration: Duration,
}

impl CommandOutput {
    /// Returns true if command succeeded (exit code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// `cmd /C` and the line it runs, when `spec` hands a line to `cmd`
#[cfg_attr(not(windows), allow(dead_code))]
fn cmd_shell_line(spec: &ProcessSpec) -> Option<(&str, &str)> {
    match spec.argv.as_slice() {
        [program, flag, line] if spec.shell && program.eq_ignore_ascii_case("cmd") => {
            Some((flag.as_str(), line.as_str()))
        }
        _ => None,
    }
}

/// `cmd` parses its own command line, so the shell line goes in verbatim
/// instead of through the MSVC argument escaping.
#[cfg(windows)]
fn push_args(command: &mut Command, spec: &ProcessSpec, args: &[String]) {
    use std::os::windows::process::CommandExt;

    match cmd_shell_line(spec) {
        Some((flag, line)) => {
            command.arg(flag).raw_arg(line);
        }
        None => {
            command.args(args);
        }
    }
}

#[cfg(not(windows))]
fn push_args(command: &mut Command, _spec: &ProcessSpec, args: &[String]) {
    command.args(args);
}

/// Seam between the runner and the operating system
#[allow(clippy::missing_errors_doc)]
pub trait ProcessSpawner {
    /// Runs `spec` to completion
    fn spawn(&mut self, spec: &ProcessSpec) -> Result<CommandOutput, PipelineError>;
}

/// Spawns real processes, streaming their output to stdout as it arrives
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl SystemSpawner {
    fn forward<R: Read + Send + 'static>(reader: R, tx: mpsc::Sender<String>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            for line in io::BufReader::new(reader).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
    }
}

impl ProcessSpawner for SystemSpawner {
    fn spawn(&mut self, spec: &ProcessSpec) -> Result<CommandOutput, PipelineError> {
        let (program, args) = spec.argv.split_first().ok_or_else(|| PipelineError::Spawn {
            program: String::new(),
            message: "empty command".to_string(),
        })?;
        let spawn_error = |e: io::Error| PipelineError::Spawn {
            program: program.clone(),
            message: e.to_string(),
        };

        let start = Instant::now();
        let mut command = Command::new(program);
        push_args(&mut command, spec, args);
        let mut child = command
            .current_dir(&spec.current_dir)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let (tx, rx) = mpsc::channel();
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(Self::forward(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(Self::forward(stderr, tx.clone()));
        }
        drop(tx);

        // Forwarded as it arrives; a build log is not kept in memory.
        let mut lines = 0;
        let stdout = io::stdout();
        for line in rx {
            let mut out = stdout.lock();
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
            lines += 1;
        }
        for handle in forwarders {
            let _ = handle.join();
        }

        let status = child.wait().map_err(spawn_error)?;
        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            lines,
            duration: start.elapsed(),
        })
    }
}

/// Executes invocations against an execution context and keeps the trace
pub struct CommandRunner {
    spawner: Box<dyn ProcessSpawner>,
    shell: HostShell,
    stage: Option<Stage>,
    trace: ExecutionTrace,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("shell", &self.shell)
            .field("stage", &self.stage)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl CommandRunner {
    /// Creates a runner spawning real processes through the host shell
    #[must_use]
    pub fn system() -> Self {
        Self::new(Box::new(SystemSpawner))
    }

    /// Creates a runner over a custom spawner
    #[must_use]
    pub fn new(spawner: Box<dyn ProcessSpawner>) -> Self {
        Self {
            spawner,
            shell: HostShell::host(),
            stage: None,
            trace: ExecutionTrace::new(),
        }
    }

    /// Overrides the shell used for shell-mode lines
    #[must_use]
    pub fn with_shell(mut self, shell: HostShell) -> Self {
        self.shell = shell;
        self
    }

    /// Labels subsequent trace entries with `stage`
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = Some(stage);
    }

    /// Stage currently labelling trace entries
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Everything executed so far
    #[must_use]
    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }

    /// Resolves an invocation against the context without running it
    #[must_use]
    pub fn resolve(&self, invocation: &CommandInvocation, context: &ExecutionContext) -> ProcessSpec {
        let tokens = invocation.tokens(context.interpreter());
        let prefix = context.run_prefix();
        let shell = invocation.is_shell() || !prefix.is_empty();

        let (argv, command_line) = if shell {
            let line = self.shell.render(prefix, &tokens);
            (self.shell.wrap(line.clone()), line)
        } else {
            let line = tokens
                .iter()
                .map(|t| self.shell.quote(t))
                .collect::<Vec<_>>()
                .join(" ");
            (tokens, line)
        };

        ProcessSpec {
            argv,
            command_line,
            shell,
            current_dir: context.current_dir().to_path_buf(),
            env: context.environment().clone(),
        }
    }

    /// Runs `invocation` and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FatalCommand`] when the command exits
    /// non-zero and the invocation is fail-fast, and
    /// [`PipelineError::Spawn`] when the process cannot be started.
    pub fn execute(
        &mut self,
        invocation: &CommandInvocation,
        context: &ExecutionContext,
    ) -> Result<i32, PipelineError> {
        let spec = self.resolve(invocation, context);

        tracing::info!(cwd = %spec.current_dir.display(), "==> {}", spec.command_line);
        let output = self.spawner.spawn(&spec)?;
        tracing::debug!(
            exit_code = output.exit_code,
            lines = output.lines,
            duration_ms = output.duration.as_millis(),
            "<== {}",
            spec.command_line
        );

        self.trace.record(TraceEntry {
            stage: self.stage,
            command: spec.command_line.clone(),
            exit_code: output.exit_code,
            exit_on_error: invocation.is_exit_on_error(),
        });

        if !output.is_success() && invocation.is_exit_on_error() {
            tracing::error!(exit_code = output.exit_code, "Command failed, aborting run");
            return Err(PipelineError::FatalCommand {
                command: spec.command_line,
                code: output.exit_code,
            });
        }
        Ok(output.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Scripted {
        seen: Rc<RefCell<Vec<ProcessSpec>>>,
        code: i32,
    }

    impl ProcessSpawner for Scripted {
        fn spawn(&mut self, spec: &ProcessSpec) -> Result<CommandOutput, PipelineError> {
            self.seen.borrow_mut().push(spec.clone());
            Ok(CommandOutput {
                exit_code: self.code,
                ..CommandOutput::default()
            })
        }
    }

    fn runner(code: i32) -> (CommandRunner, Rc<RefCell<Vec<ProcessSpec>>>) {
        let spawner = Scripted { code, ..Scripted::default() };
        let seen = Rc::clone(&spawner.seen);
        (CommandRunner::new(Box::new(spawner)).with_shell(HostShell::Posix), seen)
    }

    #[test]
    fn test_argv_mode_has_no_shell() {
        let (mut runner, seen) = runner(0);
        let ctx = ExecutionContext::new("/ws", "python3");
        let inv = CommandInvocation::new("vcs").args(["import", "source space"]);

        assert_eq!(runner.execute(&inv, &ctx), Ok(0));
        let spec = &seen.borrow()[0];
        assert_eq!(spec.argv, vec!["vcs", "import", "source space"]);
        assert!(!spec.shell);
        assert_eq!(spec.current_dir, PathBuf::from("/ws"));
    }

    #[test]
    fn test_prefix_forces_shell_and_interpreter_is_substituted() {
        let (mut runner, seen) = runner(0);
        let mut ctx = ExecutionContext::new("/ws", "python3");
        ctx.push_run_prefix(vec![".".into(), "\"/ws/venv/bin/activate\"".into(), "&&".into()]);
        ctx.push_interpreter("/ws/venv/bin/python");

        let inv = CommandInvocation::interpreter().args(["-m", "pip", "--version"]);
        runner.execute(&inv, &ctx).unwrap();

        let spec = &seen.borrow()[0];
        assert!(spec.shell);
        assert_eq!(spec.argv[0], "sh");
        assert_eq!(
            spec.command_line,
            ". \"/ws/venv/bin/activate\" && /ws/venv/bin/python -m pip --version"
        );
    }

    #[test]
    fn test_context_environment_is_passed() {
        let (mut runner, seen) = runner(0);
        let mut ctx = ExecutionContext::new("/ws", "python3");
        ctx.set_env("ConEmuANSI", "ON");
        runner.execute(&CommandInvocation::new("set").shell(true), &ctx).unwrap();
        assert_eq!(seen.borrow()[0].env.get("ConEmuANSI").map(String::as_str), Some("ON"));
    }

    #[test]
    fn test_fail_fast_returns_fatal_error() {
        let (mut runner, _) = runner(3);
        let ctx = ExecutionContext::new("/ws", "python3");
        let err = runner
            .execute(&CommandInvocation::new("curl").arg("-sk"), &ctx)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::FatalCommand {
                command: "curl -sk".to_string(),
                code: 3
            }
        );
        assert_eq!(runner.trace().len(), 1);
    }

    #[test]
    fn test_soft_failure_returns_code() {
        let (mut runner, _) = runner(7);
        runner.set_stage(Stage::Test);
        let ctx = ExecutionContext::new("/ws", "python3");
        let code = runner.execute(&CommandInvocation::new("ament").soft(), &ctx);
        assert_eq!(code, Ok(7));

        let entry = &runner.trace().entries()[0];
        assert_eq!(entry.stage, Some(Stage::Test));
        assert_eq!(entry.exit_code, 7);
        assert!(!entry.exit_on_error);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_spawner_counts_merged_output() {
        let mut spawner = SystemSpawner;
        let spec = ProcessSpec {
            argv: vec!["sh".into(), "-c".into(), "echo out; echo err 1>&2; exit 4".into()],
            command_line: String::new(),
            shell: true,
            current_dir: std::env::temp_dir(),
            env: BTreeMap::new(),
        };
        let output = spawner.spawn(&spec).unwrap();
        assert_eq!(output.exit_code, 4);
        assert_eq!(output.lines, 2);
        assert!(!output.is_success());
    }

    #[test]
    fn test_cmd_lines_are_passed_verbatim() {
        let (runner, _) = runner(0);
        let runner = runner.with_shell(HostShell::Cmd);
        let mut ctx = ExecutionContext::new("C:\\ws", "python");
        ctx.push_run_prefix(vec!["env.bat".into()]);
        let inv = CommandInvocation::new("vcs").args(["import", "source space"]);

        let spec = runner.resolve(&inv, &ctx);

        assert_eq!(
            cmd_shell_line(&spec),
            Some(("/C", "env.bat vcs import \"source space\""))
        );
        let argv_mode = runner.resolve(
            &CommandInvocation::new("vcs"),
            &ExecutionContext::new("C:\\ws", "python"),
        );
        assert_eq!(cmd_shell_line(&argv_mode), None);
    }

    #[test]
    fn test_system_spawner_reports_missing_program() {
        let mut spawner = SystemSpawner;
        let spec = ProcessSpec {
            argv: vec!["definitely-not-a-real-program-4821".into()],
            command_line: String::new(),
            shell: false,
            current_dir: std::env::temp_dir(),
            env: BTreeMap::new(),
        };
        assert!(matches!(spawner.spawn(&spec), Err(PipelineError::Spawn { .. })));
    }
}
