//! Partial execution paths.

use serde::{Deserialize, Serialize};
use timewinder_core::Hash;
use timewinder_runtime::ThreadId;

/// One explored path from an initial state
///
/// `hashes[n] --trace[n]--> hashes[n + 1]`, so there is always one more
/// hash than thread id. `predicate_traces` holds one column per registered
/// predicate, filled in as each state on the path is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalThunk {
    /// Thread executed at each step
    pub trace: Vec<ThreadId>,
    /// State reached before and after each step
    pub hashes: Vec<Hash>,
    /// Predicate values per state, one column per predicate
    pub predicate_traces: Vec<Vec<bool>>,
    /// Thread that must run next, after an immediate yield
    pub must_run: Option<ThreadId>,
}

impl EvalThunk {
    /// A path of zero steps
    #[must_use]
    pub fn new(initial: Hash, columns: usize) -> Self {
        Self {
            trace: Vec::new(),
            hashes: vec![initial],
            predicate_traces: vec![Vec::new(); columns],
            must_run: None,
        }
    }

    /// Last state on the path
    #[must_use]
    pub fn state_hash(&self) -> Hash {
        self.hashes[self.hashes.len() - 1]
    }

    /// First state on the path
    #[must_use]
    pub fn initial_hash(&self) -> Hash {
        self.hashes[0]
    }

    /// Number of steps taken
    #[must_use]
    pub fn len(&self) -> usize {
        self.trace.len()
    }

    /// True for a path of zero steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }

    /// The path extended by one step
    #[must_use]
    pub fn extend(&self, thread: ThreadId, next: Hash, must_run: Option<ThreadId>) -> Self {
        let mut out = self.clone();
        out.trace.push(thread);
        out.hashes.push(next);
        out.must_run = must_run;
        out
    }

    /// `(from, thread, to)` for every step
    pub fn edges(&self) -> impl Iterator<Item = (Hash, ThreadId, Hash)> + '_ {
        self.trace
            .iter()
            .zip(self.hashes.windows(2))
            .map(|(&tid, pair)| (pair[0], tid, pair[1]))
    }

    /// True if `hashes` is one longer than `trace`
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.hashes.is_empty() && self.hashes.len() == self.trace.len() + 1
    }
}
