//! Pipeline domain types and logic

pub mod config;
pub mod errors;
pub mod hooks;
pub mod packaging;
pub mod types;
pub mod workspace;

// Re-export public types from submodules
pub use config::{
    DEFAULT_PIP_DEPENDENCIES, DEFAULT_REPO_FILE_URL, JobConfiguration, Space, WorkspaceLayout,
};
pub use errors::{ArchiveError, ConfigError, PipelineError};
pub use hooks::{BuildFailureHook, LogOnly, WaitForOperator};
pub use packaging::PackagingStage;
pub use types::{BatchReport, Stage, StageRecord, StageResult};
pub use workspace::{MANIFEST_FILE, WorkspacePipeline};
