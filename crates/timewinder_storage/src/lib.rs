//! timewinder storage
//!
//! Content-addressed store of flat snapshots, and the flattening pass that
//! turns a snapshot with nondeterministic choices into one stored snapshot
//! per resolution.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cas;
pub mod flatten;

pub use cas::{Cas, CasConfig, CasStats, MemoryCas};
pub use flatten::{flatten_to_cas, resolve_snapshot};
