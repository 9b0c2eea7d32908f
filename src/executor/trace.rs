//! Execution trace
//!
//! Every command the runner executes is appended here, in order, whatever
//! its outcome. The trace is what tests and the run summary inspect.

use crate::pipeline::Stage;
use serde::Serialize;

/// One executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Stage that issued the command
    pub stage: Option<Stage>,
    /// Command line as announced in the log
    pub command: String,
    /// Exit code the command returned
    pub exit_code: i32,
    /// Whether a non-zero exit was fatal for this command
    pub exit_on_error: bool,
}

/// Ordered record of executed commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    /// Creates an empty trace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    /// All entries in execution order
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Entries issued by `stage`
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.stage == Some(stage))
    }

    /// Distinct stages in the order they first issued a command
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = Vec::new();
        for stage in self.entries.iter().filter_map(|e| e.stage) {
            if !stages.contains(&stage) {
                stages.push(stage);
            }
        }
        stages
    }

    /// Number of recorded commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has executed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
