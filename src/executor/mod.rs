//! Command execution layer
//!
//! This module contains the execution context, the command runner and the
//! trace it keeps of every command.

mod context;
mod invocation;
mod runner;
mod trace;

pub use context::ExecutionContext;
pub(crate) use context::within_directory;
pub use invocation::{CommandInvocation, HostShell, Program};
pub use runner::{CommandOutput, CommandRunner, ProcessSpawner, ProcessSpec, SystemSpawner};
pub use trace::{ExecutionTrace, TraceEntry};
