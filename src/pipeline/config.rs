//! Run parameters
//!
//! A [`JobConfiguration`] is assembled once from the command line (and the
//! optional settings file) and then only read for the rest of the run.

use super::errors::ConfigError;
use crate::platform::TargetOs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default location of the repository manifest
pub const DEFAULT_REPO_FILE_URL: &str =
    "https://raw.githubusercontent.com/ros2/examples/master/ros2.repos";

/// Python packages the build and test tooling needs
pub const DEFAULT_PIP_DEPENDENCIES: &[&str] = &[
    "nose", "pep8", "pyflakes", "flake8", "mock", "coverage", "EmPy", "vcstool",
];

/// One of the four renameable workspace directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// Workspace root
    Workspace,
    /// Checked-out sources
    Sourcespace,
    /// Build artifacts
    Buildspace,
    /// Installed result
    Installspace,
}

impl Space {
    /// All spaces
    pub const ALL: [Self; 4] = [
        Self::Workspace,
        Self::Sourcespace,
        Self::Buildspace,
        Self::Installspace,
    ];

    /// Flag value naming this space
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Sourcespace => "sourcespace",
            Self::Buildspace => "buildspace",
            Self::Installspace => "installspace",
        }
    }

    /// Directory name without white space
    #[must_use]
    pub const fn plain_name(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Sourcespace => "src",
            Self::Buildspace => "build",
            Self::Installspace => "install",
        }
    }

    /// Directory name with white space
    #[must_use]
    pub const fn spaced_name(&self) -> &'static str {
        match self {
            Self::Workspace => "work space",
            Self::Sourcespace => "source space",
            Self::Buildspace => "build space",
            Self::Installspace => "install space",
        }
    }
}

impl FromStr for Space {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|space| space.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownSpace(s.to_string()))
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved names of the workspace directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLayout {
    /// Workspace root, relative to where the job starts
    pub workspace: String,
    /// Source space, relative to the workspace
    pub source: String,
    /// Build space, relative to the workspace
    pub build: String,
    /// Install space, relative to the workspace
    pub install: String,
}

impl WorkspaceLayout {
    /// Layout where each space listed in `spaced` contains white space
    #[must_use]
    pub fn with_white_space_in(spaced: &[Space]) -> Self {
        let name = |space: Space| {
            if spaced.contains(&space) {
                space.spaced_name().to_string()
            } else {
                space.plain_name().to_string()
            }
        };
        Self {
            workspace: name(Space::Workspace),
            source: name(Space::Sourcespace),
            build: name(Space::Buildspace),
            install: name(Space::Installspace),
        }
    }

    /// Name of `space` in this layout
    #[must_use]
    pub fn name(&self, space: Space) -> &str {
        match space {
            Space::Workspace => &self.workspace,
            Space::Sourcespace => &self.source,
            Space::Buildspace => &self.build,
            Space::Installspace => &self.install,
        }
    }
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        Self::with_white_space_in(&[])
    }
}

/// Everything a run needs to know up front
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct JobConfiguration {
    /// Manifest to fetch
    pub repo_file_url: String,
    /// Branch to switch every repository to, if any
    pub test_branch: Option<String>,
    /// Target platform
    pub os: TargetOs,
    /// Build inside a fresh virtualenv
    pub do_venv: bool,
    /// Build with the RTI Connext vendor
    pub connext: bool,
    /// Force ANSI colour in log output
    pub force_ansi_color: bool,
    /// Build every package in isolation (packaging only)
    pub isolated: bool,
    /// Workspace directory names
    pub layout: WorkspaceLayout,
    /// Host interpreter
    pub python_interpreter: PathBuf,
    /// Python packages installed before fetching sources
    pub pip_dependencies: Vec<String>,
}

impl JobConfiguration {
    /// Defaults for `os`
    #[must_use]
    pub fn new(os: TargetOs) -> Self {
        Self {
            repo_file_url: DEFAULT_REPO_FILE_URL.to_string(),
            test_branch: None,
            os,
            do_venv: false,
            connext: false,
            force_ansi_color: false,
            isolated: false,
            layout: WorkspaceLayout::default(),
            python_interpreter: PathBuf::from(os.default_interpreter()),
            pip_dependencies: DEFAULT_PIP_DEPENDENCIES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Sets the manifest URL
    #[must_use]
    pub fn with_repo_file_url(mut self, url: impl Into<String>) -> Self {
        self.repo_file_url = url.into();
        self
    }

    /// Sets the branch override
    #[must_use]
    pub fn with_test_branch(mut self, branch: Option<String>) -> Self {
        self.test_branch = branch;
        self
    }

    /// Enables or disables the virtualenv
    #[must_use]
    pub fn with_venv(mut self, do_venv: bool) -> Self {
        self.do_venv = do_venv;
        self
    }

    /// Enables or disables Connext
    #[must_use]
    pub fn with_connext(mut self, connext: bool) -> Self {
        self.connext = connext;
        self
    }

    /// Forces ANSI colour
    #[must_use]
    pub fn with_force_ansi_color(mut self, force: bool) -> Self {
        self.force_ansi_color = force;
        self
    }

    /// Enables isolated package builds
    #[must_use]
    pub fn with_isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// Sets the workspace layout
    #[must_use]
    pub fn with_layout(mut self, layout: WorkspaceLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the host interpreter
    #[must_use]
    pub fn with_python_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.python_interpreter = interpreter.into();
        self
    }

    /// Replaces the auxiliary pip packages
    #[must_use]
    pub fn with_pip_dependencies(mut self, deps: Vec<String>) -> Self {
        self.pip_dependencies = deps;
        self
    }

    /// Rejects combinations the job cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::VenvOnWindows`] for `--do-venv` on Windows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.do_venv && self.os == TargetOs::Windows {
            return Err(ConfigError::VenvOnWindows);
        }
        Ok(())
    }

    /// `name=value` pairs for the startup log
    #[must_use]
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("repo_file_url", self.repo_file_url.clone()),
            (
                "test_branch",
                self.test_branch.clone().unwrap_or_else(|| "None".to_string()),
            ),
            ("os", self.os.to_string()),
            ("do_venv", self.do_venv.to_string()),
            ("connext", self.connext.to_string()),
            ("force_ansi_color", self.force_ansi_color.to_string()),
            ("isolated", self.isolated.to_string()),
            ("workspace", self.layout.workspace.clone()),
            ("sourcespace", self.layout.source.clone()),
            ("buildspace", self.layout.build.clone()),
            ("installspace", self.layout.install.clone()),
            ("python_interpreter", self.python_interpreter.display().to_string()),
        ]
    }
}
