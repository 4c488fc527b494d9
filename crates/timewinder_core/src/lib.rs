//! timewinder core types
//!
//! Pure data with no I/O: the recursive state [`Value`], the [`Snapshot`]
//! map every mounted entity is reduced to, the canonical encoding of flat
//! snapshots and the BLAKE3 [`Hash`] that identifies them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod error;
pub mod hash;
pub mod value;

// Re-exports
pub use encoding::CanonicalEncode;
pub use error::{CoreError, CoreResult};
pub use hash::{Hash, HashError};
pub use value::{ChoiceSet, Snapshot, Value};
