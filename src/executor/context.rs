//! Mutable per-run execution state

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// State shared by every command of one batch run
///
/// Owned by the pipeline for the duration of the run and mutated in place by
/// the stages that activate an isolated environment or inject variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Raw shell fragments prepended to every command
    run_prefix: Vec<String>,

    /// Interpreter used wherever an invocation names the active interpreter
    interpreter: PathBuf,

    /// Overrides laid over the inherited process environment
    environment: BTreeMap<String, String>,

    /// Directory relative paths and child processes resolve against
    current_dir: PathBuf,
}

impl ExecutionContext {
    /// Creates a context rooted at `current_dir` using the host interpreter
    #[must_use]
    pub fn new(current_dir: impl Into<PathBuf>, interpreter: impl Into<PathBuf>) -> Self {
        Self {
            run_prefix: Vec::new(),
            interpreter: interpreter.into(),
            environment: BTreeMap::new(),
            current_dir: current_dir.into(),
        }
    }

    /// Current run prefix, empty until an environment is entered
    #[must_use]
    pub fn run_prefix(&self) -> &[String] {
        &self.run_prefix
    }

    /// Active interpreter
    #[must_use]
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Environment overrides
    #[must_use]
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Directory commands currently execute from
    #[must_use]
    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Replaces the run prefix wholesale.
    ///
    /// There is a single prefix slot. A caller that wants to keep an earlier
    /// prefix in effect composes it into `prefix` itself.
    pub fn push_run_prefix(&mut self, prefix: Vec<String>) {
        tracing::debug!(prefix = ?prefix, "Replacing run prefix");
        self.run_prefix = prefix;
    }

    /// Replaces the active interpreter wholesale
    pub fn push_interpreter(&mut self, interpreter: impl Into<PathBuf>) {
        self.interpreter = interpreter.into();
        tracing::debug!(interpreter = %self.interpreter.display(), "Replacing interpreter");
    }

    /// Sets an environment override; later values win
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.environment.insert(key.into(), value.into());
    }

    /// Gets an environment override
    #[must_use]
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.environment.get(key)
    }

    /// Resolves `path` against the current directory
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.current_dir.join(path)
    }

    /// Switches to `path` (relative to the current directory) and returns
    /// the directory that was active before.
    pub(crate) fn enter_directory(&mut self, path: impl AsRef<Path>) -> PathBuf {
        let next = self.resolve(path);
        tracing::debug!(from = %self.current_dir.display(), to = %next.display(), "Entering directory");
        std::mem::replace(&mut self.current_dir, next)
    }

    pub(crate) fn restore_directory(&mut self, previous: PathBuf) {
        tracing::debug!(to = %previous.display(), "Leaving directory");
        self.current_dir = previous;
    }

    /// Runs `body` with the current directory switched to `path`.
    ///
    /// The previous directory is restored however `body` exits: normal
    /// return, an `Err`, or a panic unwinding through it.
    pub fn with_directory<T>(
        &mut self,
        path: impl AsRef<Path>,
        body: impl FnOnce(&mut Self) -> T,
    ) -> T {
        within_directory(self, |ctx| ctx, path, body)
    }
}

/// Runs `body` on `owner` with the context reached through `context`
/// switched to `path`, restoring the previous directory on every exit path.
pub(crate) fn within_directory<S, T>(
    owner: &mut S,
    context: impl Fn(&mut S) -> &mut ExecutionContext,
    path: impl AsRef<Path>,
    body: impl FnOnce(&mut S) -> T,
) -> T {
    let previous = context(&mut *owner).enter_directory(path);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *owner)));
    context(&mut *owner).restore_directory(previous);
    match outcome {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext::new("/base", "python3")
    }

    #[test]
    fn test_new_context_is_empty() {
        let ctx = context();
        assert!(ctx.run_prefix().is_empty());
        assert!(ctx.environment().is_empty());
        assert_eq!(ctx.interpreter(), Path::new("python3"));
        assert_eq!(ctx.current_dir(), Path::new("/base"));
    }

    #[test]
    fn test_push_run_prefix_replaces() {
        let mut ctx = context();
        ctx.push_run_prefix(vec!["a".to_string(), "&&".to_string()]);
        ctx.push_run_prefix(vec!["b".to_string()]);
        assert_eq!(ctx.run_prefix(), ["b".to_string()]);
    }

    #[test]
    fn test_push_interpreter_replaces() {
        let mut ctx = context();
        ctx.push_interpreter("/ws/venv/bin/python");
        assert_eq!(ctx.interpreter(), Path::new("/ws/venv/bin/python"));
    }

    #[test]
    fn test_env_override_last_wins() {
        let mut ctx = context();
        ctx.set_env("TERM", "dumb");
        ctx.set_env("TERM", "xterm-256color");
        assert_eq!(ctx.get_env("TERM").map(String::as_str), Some("xterm-256color"));
    }

    #[test]
    fn test_with_directory_nests_and_restores() {
        let mut ctx = context();
        ctx.with_directory("workspace", |ctx| {
            assert_eq!(ctx.current_dir(), Path::new("/base/workspace"));
            ctx.with_directory("src", |ctx| {
                assert_eq!(ctx.current_dir(), Path::new("/base/workspace/src"));
            });
            assert_eq!(ctx.current_dir(), Path::new("/base/workspace"));
        });
        assert_eq!(ctx.current_dir(), Path::new("/base"));
    }

    #[test]
    fn test_with_directory_restores_on_error() {
        let mut ctx = context();
        let result: Result<(), &str> = ctx.with_directory("workspace", |_| Err("boom"));
        assert_eq!(result, Err("boom"));
        assert_eq!(ctx.current_dir(), Path::new("/base"));
    }

    #[test]
    fn test_with_directory_restores_on_panic() {
        let mut ctx = context();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: () = ctx.with_directory("workspace", |_| panic!("boom"));
        }));
        assert!(caught.is_err());
        assert_eq!(ctx.current_dir(), Path::new("/base"));
    }
}
