//! Packaging run
//!
//! Shares every setup stage with [`WorkspacePipeline`], then builds the
//! release tree instead of building and testing it, prunes executables that
//! must not ship, and archives the install space.

use super::errors::PipelineError;
use super::types::{BatchReport, Stage};
use super::workspace::{Stages, WorkspacePipeline, build_tool};
use crate::executor::ExecutionTrace;
use crate::infrastructure::ArchiveDescriptor;
use crate::platform::{BatchJob, TargetOs};
use std::fs;
use std::path::{Path, PathBuf};

/// Package built on its own after the main tree
pub const ROS1_BRIDGE: &str = "ros1_bridge";

/// Marker file that makes the build tool skip a package
pub const IGNORE_MARKER: &str = "AMENT_IGNORE";

const BUILD_TYPE: &str = "-DCMAKE_BUILD_TYPE=RelWithDebInfo";

/// Removes its marker file when dropped
#[derive(Debug)]
struct IgnoreMarker {
    path: PathBuf,
}

impl IgnoreMarker {
    /// Writes the marker into `package_dir`
    fn place(package_dir: &Path) -> Result<Self, PipelineError> {
        let path = package_dir.join(IGNORE_MARKER);
        fs::write(&path, "")?;
        tracing::info!(path = %path.display(), "Masked package from the main build");
        Ok(Self { path })
    }
}

impl Drop for IgnoreMarker {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Could not remove ignore marker");
        }
    }
}

/// Builds and archives a binary release of the workspace
#[derive(Debug)]
pub struct PackagingStage {
    pipeline: WorkspacePipeline,
}

impl PackagingStage {
    /// Wraps a pipeline whose setup stages have been configured
    #[must_use]
    pub fn new(pipeline: WorkspacePipeline) -> Self {
        Self { pipeline }
    }

    /// Runs setup, the release builds, pruning and archiving.
    ///
    /// # Errors
    ///
    /// Every packaging stage is fail-fast; returns the first failure.
    pub fn run(&mut self) -> Result<i32, PipelineError> {
        self.pipeline.execute(|stages, job| stages.build_and_package(job))
    }

    /// Stage outcomes and the archive path
    #[must_use]
    pub fn report(&self) -> &BatchReport {
        self.pipeline.report()
    }

    /// Every command executed so far
    #[must_use]
    pub fn trace(&self) -> &ExecutionTrace {
        self.pipeline.trace()
    }
}

impl Stages<'_> {
    fn build_and_package(&mut self, job: &mut BatchJob) -> Result<(), PipelineError> {
        let config = self.config;
        let layout = &config.layout;
        let os = config.os;

        self.fatal(job, Stage::PackageBuild, |job| {
            let bridge = job
                .context()
                .resolve(&layout.source)
                .join("ros2")
                .join(ROS1_BRIDGE);
            let _marker = if bridge.is_dir() {
                Some(IgnoreMarker::place(&bridge)?)
            } else {
                None
            };

            let mut build = build_tool(&layout.source)
                .arg("build")
                .args(["--build-space", layout.build.as_str()])
                .args(["--install-space", layout.install.as_str()])
                .arg(layout.source.as_str());
            if config.isolated {
                build = build.arg("--isolated");
            }
            if os != TargetOs::Windows {
                build = build.args(["--cmake-args", BUILD_TYPE]);
            }
            job.run(&build)
        })?;

        if matches!(os, TargetOs::Linux | TargetOs::Osx) {
            self.fatal(job, Stage::BridgeBuild, |job| {
                let mut build = build_tool(&layout.source)
                    .arg("build")
                    .args(["--build-space", layout.build.as_str()])
                    .args(["--install-space", layout.install.as_str()])
                    .arg(layout.source.as_str())
                    .args(["--only", ROS1_BRIDGE]);
                if config.isolated {
                    build = build.arg("--isolated");
                }
                // The bridge exhausts memory when compiled in parallel.
                job.run(&build.args(["--cmake-args", BUILD_TYPE, "--make-flags", "-j1"]))
            })?;
        } else {
            self.skip(Stage::BridgeBuild, "the bridge is not built on this platform");
        }

        self.fatal(job, Stage::PruneExecutables, |job| {
            let bin = job.context().resolve(&layout.install).join("bin");
            prune_executables(&bin)
        })?;

        let archive = self.fatal(job, Stage::Archive, |job| {
            let root = job.context().resolve(&layout.install);
            let descriptor = ArchiveDescriptor::for_os(os, root, job.context().current_dir());
            Ok(descriptor.write()?)
        })?;
        tracing::info!(archive = %archive.display(), "created archive");
        self.report.archive = Some(archive);
        Ok(())
    }
}

/// Whether an installed executable is left out of the package
fn is_excluded(name: &str) -> bool {
    name.contains("__rmw_") || name.starts_with("simple_bridge") || name.starts_with("static_bridge")
}

/// Deletes excluded entries of `bin`; a missing `bin` is left alone
fn prune_executables(bin: &Path) -> Result<(), PipelineError> {
    if !bin.is_dir() {
        tracing::debug!(path = %bin.display(), "No executables to prune");
        return Ok(());
    }
    for entry in fs::read_dir(bin)? {
        let entry = entry?;
        let name = entry.file_name();
        if !is_excluded(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        tracing::info!(path = %path.display(), "Removing executable from package");
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
