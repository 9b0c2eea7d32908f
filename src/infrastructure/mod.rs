//! Infrastructure layer
//!
//! This module contains the logging setup, the settings file and the
//! package archive writers.

mod archive;
mod config;
mod logging;

pub use archive::{ArchiveDescriptor, ArchiveFormat};
pub use config::Config;
pub use logging::init_logging;
