//! Platform-specific job hooks
//!
//! The pipeline is OS-agnostic; everything that differs between Linux, macOS
//! and Windows (diagnostic commands, vendor environment scripts, console
//! quirks) lives behind the [`PlatformJob`] trait. Exactly one variant is
//! selected per run, by `--os` or by detecting the host.

mod job;
mod linux;
mod macos;
mod windows;

pub use job::BatchJob;
pub use linux::LinuxJob;
pub use macos::MacOsJob;
pub use windows::WindowsJob;

use crate::pipeline::{ConfigError, PipelineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Operating system a job targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    /// Linux
    Linux,
    /// macOS
    Osx,
    /// Windows
    Windows,
}

impl TargetOs {
    /// Returns the OS name as used in flags and archive names
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Osx => "osx",
            Self::Windows => "windows",
        }
    }

    /// Maps a host OS identifier (as in `std::env::consts::OS`) to a target
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UndetectedPlatform`] for unsupported hosts.
    pub fn detect_from(host: &str) -> Result<Self, ConfigError> {
        let host = host.to_lowercase();
        if host.starts_with("linux") {
            Ok(Self::Linux)
        } else if host.starts_with("macos") || host.starts_with("darwin") {
            Ok(Self::Osx)
        } else if host.starts_with("windows") {
            Ok(Self::Windows)
        } else {
            Err(ConfigError::UndetectedPlatform(host))
        }
    }

    /// Detects the platform this process runs on
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UndetectedPlatform`] for unsupported hosts.
    pub fn detect() -> Result<Self, ConfigError> {
        Self::detect_from(std::env::consts::OS)
    }

    /// Explicit request wins; otherwise the host is detected
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unknown names or undetectable hosts.
    pub fn select(requested: Option<&str>) -> Result<Self, ConfigError> {
        match requested {
            Some(name) => name.parse(),
            None => Self::detect(),
        }
    }

    /// Interpreter name used when none is configured
    #[must_use]
    pub const fn default_interpreter(&self) -> &'static str {
        match self {
            Self::Windows => "python",
            Self::Linux | Self::Osx => "python3",
        }
    }
}

impl FromStr for TargetOs {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Self::Linux),
            "osx" => Ok(Self::Osx),
            "windows" => Ok(Self::Windows),
            other => Err(ConfigError::UnsupportedOs(other.to_string())),
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OS-specific hooks the pipeline calls at fixed extension points
#[allow(clippy::missing_errors_doc)]
pub trait PlatformJob {
    /// Which OS this variant serves
    fn os(&self) -> TargetOs;

    /// Runs before anything else touches the workspace
    fn pre(&self, job: &mut BatchJob) -> Result<(), PipelineError>;

    /// Prints the environment the job runs in
    fn show_env(&self, job: &mut BatchJob) -> Result<(), PipelineError>;

    /// Final environment tweaks before the build proper
    fn setup_env(&self, job: &mut BatchJob) -> Result<(), PipelineError>;

    /// Whether the isolation tool can be installed without elevated rights
    fn can_install_isolation_tool(&self) -> bool {
        true
    }
}

/// Builds the variant for `os`
#[must_use]
pub fn platform_job(os: TargetOs, connext: bool) -> Box<dyn PlatformJob> {
    match os {
        TargetOs::Linux => Box::new(LinuxJob::new(connext)),
        TargetOs::Osx => Box::new(MacOsJob::new(connext)),
        TargetOs::Windows => Box::new(WindowsJob::new(connext)),
    }
}

/// Composes a POSIX `. 'script' &&` wrapper after the current run prefix
pub(crate) fn source_env_script(job: &mut BatchJob, script: &Path) {
    tracing::info!(script = %script.display(), "Sourcing vendor environment script");
    let mut prefix = job.context().run_prefix().to_vec();
    prefix.extend([
        ".".to_string(),
        shell_words::quote(&script.to_string_lossy()).into_owned(),
        "&&".to_string(),
    ]);
    job.context_mut().push_run_prefix(prefix);
}
