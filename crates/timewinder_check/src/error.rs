//! Checking errors.
//!
//! Exhausting the state space or the step budget is not an error; a run
//! that ends either way returns its statistics.

use crate::thunk::EvalThunk;
use serde::Serialize;
use thiserror::Error;
use timewinder_core::CoreError;
use timewinder_runtime::{StepFault, ThreadId};

/// Check result type
pub type CheckResult<T> = Result<T, CheckError>;

/// A specification that failed on an explored path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Name of the failed specification
    pub spec: String,
    /// Path that refutes it
    pub thunk: EvalThunk,
    /// Dump of every mount at the failing state
    pub state: String,
}

/// Check error type
#[derive(Debug, Error)]
pub enum CheckError {
    /// The checked system was set up or used incorrectly
    #[error(transparent)]
    Usage(#[from] CoreError),

    /// A process step failed
    #[error("Process {process} (thread {thread}) faulted: {source}")]
    ProcessFault {
        /// Process name at the failing step
        process: String,
        /// Thread that faulted
        thread: ThreadId,
        /// Underlying fault
        #[source]
        source: StepFault,
        /// Path leading to the faulting step
        thunk: Box<EvalThunk>,
    },

    /// A safety specification does not hold
    #[error("Safety violation: {}", .0.spec)]
    SafetyViolation(Box<Violation>),

    /// A liveness specification does not hold
    #[error("Liveness violation: {}", .0.spec)]
    LivenessViolation(Box<Violation>),
}

impl CheckError {
    /// The violation, if this is one
    #[must_use]
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Self::SafetyViolation(v) | Self::LivenessViolation(v) => Some(&**v),
            _ => None,
        }
    }

    /// The path that led to the error, if there is one
    #[must_use]
    pub fn thunk(&self) -> Option<&EvalThunk> {
        match self {
            Self::SafetyViolation(v) | Self::LivenessViolation(v) => Some(&v.thunk),
            Self::ProcessFault { thunk, .. } => Some(&**thunk),
            Self::Usage(_) => None,
        }
    }
}
