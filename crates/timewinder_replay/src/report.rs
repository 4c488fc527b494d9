//! Printable replay results.

use crate::diff::SnapshotDiff;
use serde::Serialize;
use std::fmt;
use timewinder_core::Hash;
use timewinder_runtime::ThreadId;

/// One re-executed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStep {
    /// 1-based step number
    pub step: usize,
    /// Thread that ran
    pub thread: ThreadId,
    /// Process name at the step that ran
    pub process: String,
    /// State before
    pub from: Hash,
    /// State after
    pub to: Hash,
    /// Dump of every mount after the step
    pub state: String,
    /// What the step changed
    pub changes: SnapshotDiff,
}

impl ReplayStep {
    /// `from -- thread --> to` with short hashes
    #[must_use]
    pub fn edge(&self) -> String {
        format!("{} -- {} --> {}", self.from.short(), self.thread, self.to.short())
    }
}

/// A replayed path from its initial state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    /// First state
    pub initial: Hash,
    /// Dump of every mount in the first state
    pub initial_state: String,
    /// Steps in order
    pub steps: Vec<ReplayStep>,
}

impl ReplayReport {
    /// Last state reached
    #[must_use]
    pub fn final_hash(&self) -> Hash {
        self.steps.last().map_or(self.initial, |s| s.to)
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Initial State:")?;
        writeln!(f, "{}", self.initial_state)?;
        for step in &self.steps {
            writeln!(
                f,
                "Step {}, thread {} executes ({})",
                step.step, step.thread, step.process
            )?;
            writeln!(f, "{}", step.edge())?;
            write!(f, "{}", step.changes)?;
            writeln!(f, "{}", "*".repeat(26))?;
            writeln!(f, "State:")?;
            writeln!(f, "{}", step.state)?;
        }
        Ok(())
    }
}
