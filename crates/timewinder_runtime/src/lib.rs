//! timewinder runtime
//!
//! The entities a model checker explores: passive [`Model`]s, steppable
//! [`Process`]es, and the [`StateController`] that mounts them, commits their
//! combined state to the content store and restores it again.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod controller;
pub mod model;
pub mod process;

pub use controller::StateController;
pub use model::{Model, Models, ObjectModel};
pub use process::{
    Continuation, Fairness, Process, StepContext, StepFault, StepProcess, ThreadId,
};
