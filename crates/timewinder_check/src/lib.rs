//! timewinder checking
//!
//! Breadth-first exploration of every interleaving of the processes mounted
//! on a [`StateController`](timewinder_runtime::StateController), evaluating
//! temporal specifications over each explored trace.
//!
//! Specifications are built from [`Predicate`]s with the [`Ltl`] combinators.
//! Safety specifications are checked at every explored state; liveness
//! specifications are checked when a branch terminates (see
//! [`LivenessTrigger`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod evaluator;
pub mod ltl;
pub mod predicate;
pub mod spec;
pub mod thunk;
pub mod trace;

pub use config::{EvaluatorConfig, LivenessTrigger};
pub use error::{CheckError, CheckResult, Violation};
pub use evaluator::{Evaluator, EvaluatorStats};
pub use ltl::{Formula, Ltl};
pub use predicate::{FnPredicate, ForAll, Predicate};
pub use spec::Spec;
pub use thunk::EvalThunk;
