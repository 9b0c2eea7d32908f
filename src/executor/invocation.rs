//! Command invocations
//!
//! A [`CommandInvocation`] is an ordered token sequence plus the two
//! execution options the batch job cares about: whether a shell interprets
//! the line and whether a non-zero exit aborts the run.

use std::fmt;
use std::path::Path;

/// First token of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// Whatever interpreter the execution context currently points at
    Interpreter,
    /// A literal executable name or path
    Literal(String),
}

/// A command to run through the [`CommandRunner`](super::CommandRunner)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    program: Program,
    args: Vec<String>,
    shell: bool,
    exit_on_error: bool,
}

impl CommandInvocation {
    /// Creates an invocation of a literal program, fail-fast by default
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: Program::Literal(program.into()),
            args: Vec::new(),
            shell: false,
            exit_on_error: true,
        }
    }

    /// Creates an invocation of the active interpreter
    #[must_use]
    pub fn interpreter() -> Self {
        Self {
            program: Program::Interpreter,
            args: Vec::new(),
            shell: false,
            exit_on_error: true,
        }
    }

    /// Appends one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Requests shell interpretation of the rendered line
    #[must_use]
    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    /// Sets whether a non-zero exit aborts the run
    #[must_use]
    pub fn exit_on_error(mut self, exit_on_error: bool) -> Self {
        self.exit_on_error = exit_on_error;
        self
    }

    /// Shorthand for `exit_on_error(false)`
    #[must_use]
    pub fn soft(self) -> Self {
        self.exit_on_error(false)
    }

    /// The program token
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Arguments after the program
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Whether shell interpretation was requested
    #[must_use]
    pub fn is_shell(&self) -> bool {
        self.shell
    }

    /// Whether a non-zero exit aborts the run
    #[must_use]
    pub fn is_exit_on_error(&self) -> bool {
        self.exit_on_error
    }

    /// Full token list with the interpreter substituted in
    #[must_use]
    pub fn tokens(&self, interpreter: &Path) -> Vec<String> {
        let program = match &self.program {
            Program::Interpreter => interpreter.to_string_lossy().into_owned(),
            Program::Literal(name) => name.clone(),
        };
        std::iter::once(program)
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program = match &self.program {
            Program::Interpreter => "<interpreter>",
            Program::Literal(name) => name.as_str(),
        };
        write!(f, "{program}")?;
        for arg in &self.args {
            write!(f, " {}", shell_words::quote(arg))?;
        }
        Ok(())
    }
}

/// Quoting convention of the shell that interprets shell-mode lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostShell {
    /// `sh -c`
    Posix,
    /// `cmd /C`
    Cmd,
}

impl HostShell {
    /// The shell of the machine this process runs on
    #[must_use]
    pub fn host() -> Self {
        if cfg!(windows) { Self::Cmd } else { Self::Posix }
    }

    /// Quotes one token so the shell passes it through as a single word
    #[must_use]
    pub fn quote(self, token: &str) -> String {
        match self {
            Self::Posix => shell_words::quote(token).into_owned(),
            Self::Cmd => {
                if token.is_empty() {
                    "\"\"".to_string()
                } else if token.contains([' ', '\t', '&', '|', '<', '>', '^', '(', ')']) {
                    format!("\"{}\"", token.replace('"', "\\\""))
                } else {
                    token.to_string()
                }
            }
        }
    }

    /// Renders a shell line: the prefix verbatim, every token quoted
    #[must_use]
    pub fn render(self, prefix: &[String], tokens: &[String]) -> String {
        prefix
            .iter()
            .cloned()
            .chain(tokens.iter().map(|t| self.quote(t)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Argument vector that hands `line` to this shell
    #[must_use]
    pub fn wrap(self, line: String) -> Vec<String> {
        match self {
            Self::Posix => vec!["sh".to_string(), "-c".to_string(), line],
            Self::Cmd => vec!["cmd".to_string(), "/C".to_string(), line],
        }
    }
}
