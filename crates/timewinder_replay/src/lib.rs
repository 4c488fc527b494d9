//! timewinder replay
//!
//! Re-executes an explored path step by step on the controller that
//! produced it, checking that each recorded state is reproduced, and renders
//! the result as a readable counterexample with per-step state diffs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod engine;
pub mod report;

pub use diff::{FieldChange, SnapshotDiff};
pub use engine::{ReplayConfig, ReplayEngine, ReplayError, ReplayResult};
pub use report::{ReplayReport, ReplayStep};
