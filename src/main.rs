//! ros2-batch - CI batch job for ROS 2 workspaces
//!
//! ## Commands
//!
//! - `ros2-batch batch` - Fetch, build and test a fresh workspace
//! - `ros2-batch package` - Fetch, build and archive a binary release
//! - `ros2-batch completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Build and test on the detected platform
//! ros2-batch batch --do-venv
//!
//! # Exercise paths containing white space
//! ros2-batch batch --white-space-in sourcespace buildspace
//!
//! # Package a release for Windows
//! ros2-batch package --os windows
//! ```

use ros2_batch::pipeline::PipelineError;
use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<PipelineError>() {
                Some(err) => ExitCode::from(err.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}
