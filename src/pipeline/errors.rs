//! Error types for the batch job

use thiserror::Error;

/// Errors that abort a batch job
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The run was rejected before any side effect
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A command run with exit-on-error semantics returned non-zero
    #[error("Command '{command}' failed with exit code {code}")]
    FatalCommand {
        /// Rendered command line.
        command: String,
        /// Exit code returned by the command.
        code: i32,
    },

    /// The process could not be started at all
    #[error("Failed to start '{program}': {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error message.
        message: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(String),

    /// Writing the package archive failed
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl PipelineError {
    /// Process exit code this error should terminate the run with.
    ///
    /// Fatal command failures forward the command's own code when it fits
    /// in a process exit status; everything else exits with 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::FatalCommand { code, .. } => u8::try_from(*code)
                .ok()
                .filter(|c| *c != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Configuration errors, raised before the workspace is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `--do-venv` requested for a Windows job
    #[error("--do-venv is not supported on windows")]
    VenvOnWindows,

    /// An OS name that is not one of linux, osx, windows
    #[error("Unsupported operating system: '{0}'")]
    UnsupportedOs(String),

    /// The host platform is none of the supported ones
    #[error("Could not detect a supported platform (host reports '{0}'), use --os")]
    UndetectedPlatform(String),

    /// Unknown `--white-space-in` selector
    #[error("Unknown workspace directory '{0}', expected one of: sourcespace, buildspace, installspace, workspace")]
    UnknownSpace(String),

    /// The settings file could not be loaded
    #[error("Invalid settings file '{path}': {message}")]
    Settings {
        /// Path of the settings file.
        path: String,
        /// Parse or read error.
        message: String,
    },
}

/// Errors raised while writing the package archive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The directory to archive does not exist
    #[error("Install directory '{0}' does not exist")]
    MissingRoot(String),

    /// Failure walking or reading the install tree
    #[error("Failed to read '{path}': {message}")]
    Read {
        /// Path being read.
        path: String,
        /// Underlying error message.
        message: String,
    },

    /// Failure writing the archive file
    #[error("Failed to write archive '{path}': {message}")]
    Write {
        /// Archive path.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_command_exit_code_is_forwarded() {
        let err = PipelineError::FatalCommand {
            command: "curl".to_string(),
            code: 22,
        };
        assert_eq!(err.exit_code(), 22);
    }

    #[test]
    fn test_out_of_range_exit_codes_map_to_one() {
        for code in [-1, 0, 256, 1000] {
            let err = PipelineError::FatalCommand {
                command: "x".to_string(),
                code,
            };
            assert_eq!(err.exit_code(), 1, "code {code}");
        }
    }

    #[test]
    fn test_config_error_exits_with_one() {
        let err = PipelineError::from(ConfigError::VenvOnWindows);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "Configuration error: --do-venv is not supported on windows"
        );
    }
}
