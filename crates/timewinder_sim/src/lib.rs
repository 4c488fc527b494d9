//! timewinder reference scenarios
//!
//! Small, fully specified systems with known outcomes: bank transfers with
//! and without a funds check, and bounded queues with and without waiting.
//! They double as regression oracles for the explorer and as the scenarios
//! the command line runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accounts;
pub mod condwait;
pub mod queue;
pub mod scenario;

pub use scenario::{find, scenarios, Expected, Scenario};

use timewinder_core::CoreResult;
use timewinder_runtime::{StateController, StepProcess};

/// Mount processes as `_thread_0`, `_thread_1`, ... in order
///
/// # Errors
///
/// Returns error if a thread name is already mounted
pub fn mount_threads(
    controller: &mut StateController,
    threads: impl IntoIterator<Item = StepProcess>,
) -> CoreResult<()> {
    for (i, thread) in threads.into_iter().enumerate() {
        controller.mount_process(format!("_thread_{}", i), thread)?;
    }
    Ok(())
}
