//! # ros2-batch - CI batch jobs for ROS 2 workspaces
//!
//! Drives one CI run over a fresh workspace: clean it, prepare the Python
//! toolchain (optionally inside a virtualenv), fetch the repository
//! manifest, check out every repository, then either build, test and collect
//! results or build a release and archive it.
//!
//! ## Layers
//!
//! - [`executor`]: commands, the execution context and the runner that
//!   spawns processes
//! - [`platform`]: the Linux, macOS and Windows variants of the job
//! - [`pipeline`]: configuration, stages and the two entry points,
//!   [`WorkspacePipeline`] and [`PackagingStage`]
//! - [`infrastructure`]: logging, the settings file and archive writers
//!
//! ## Failure policy
//!
//! Most commands are fail-fast: a non-zero exit ends the run with a
//! [`PipelineError::FatalCommand`] carrying that code. Branch override,
//! build, test and result collection are soft; their codes are recorded in
//! the [`BatchReport`] and the run continues.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod executor;
pub mod infrastructure;
pub mod pipeline;
pub mod platform;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use executor::{CommandInvocation, CommandRunner, ExecutionContext, ExecutionTrace};
pub use infrastructure::{ArchiveDescriptor, ArchiveFormat, Config};
pub use pipeline::{
    BatchReport, JobConfiguration, PackagingStage, PipelineError, Stage, StageResult,
    WorkspaceLayout, WorkspacePipeline,
};
pub use platform::{BatchJob, PlatformJob, TargetOs};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
