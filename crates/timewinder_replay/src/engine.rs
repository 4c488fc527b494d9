//! Replay engine for explored paths.

use crate::diff::SnapshotDiff;
use crate::report::{ReplayReport, ReplayStep};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use timewinder_check::EvalThunk;
use timewinder_core::CoreError;
use timewinder_runtime::{StateController, StepFault, ThreadId};

/// Replay result type
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Re-execute each step and require the recorded state among its outcomes
    pub verify_hashes: bool,
    /// Maximum steps to replay (0 = unlimited)
    pub max_steps: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            verify_hashes: true,
            max_steps: 0,
        }
    }
}

impl ReplayConfig {
    /// Enable or disable re-execution
    #[must_use]
    pub fn with_verify_hashes(mut self, verify: bool) -> Self {
        self.verify_hashes = verify;
        self
    }

    /// Set the step limit
    #[must_use]
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }
}

/// Replay error
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The path has no states
    #[error("Path is empty")]
    EmptyPath,

    /// The path does not have one more state than steps
    #[error("Malformed path: {hashes} states for {steps} steps")]
    MalformedThunk {
        /// Number of recorded states
        hashes: usize,
        /// Number of recorded steps
        steps: usize,
    },

    /// Re-executing a step did not reproduce the recorded state
    #[error("Step {step} diverged: expected {expected}, produced [{}]", .produced.join(", "))]
    Divergence {
        /// 1-based step number
        step: usize,
        /// Recorded state, short form
        expected: String,
        /// States the step produced, short form
        produced: Vec<String>,
    },

    /// A step faulted during re-execution
    #[error("Step {step} (thread {thread}) faulted: {source}")]
    Fault {
        /// 1-based step number
        step: usize,
        /// Thread that faulted
        thread: ThreadId,
        /// Underlying fault
        #[source]
        source: StepFault,
    },

    /// State could not be restored or committed
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Replays explored paths on a controller
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    config: ReplayConfig,
}

impl ReplayEngine {
    /// Create a new replay engine
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Replay a path on the controller that explored it
    ///
    /// The controller is left in the last replayed state.
    ///
    /// # Errors
    ///
    /// Returns error if the path is malformed, a step faults or does not
    /// reproduce its recorded state, or a state is not stored
    pub fn replay(
        &self,
        controller: &mut StateController,
        thunk: &EvalThunk,
    ) -> ReplayResult<ReplayReport> {
        if thunk.hashes.is_empty() {
            return Err(ReplayError::EmptyPath);
        }
        if !thunk.is_well_formed() {
            return Err(ReplayError::MalformedThunk {
                hashes: thunk.hashes.len(),
                steps: thunk.trace.len(),
            });
        }

        let initial = thunk.initial_hash();
        controller.restore(&initial)?;
        let mut report = ReplayReport {
            initial,
            initial_state: controller.state_to_string(),
            steps: Vec::new(),
        };

        let limit = match self.config.max_steps {
            0 => usize::MAX,
            n => n,
        };
        for (i, (from, thread, to)) in thunk.edges().enumerate().take(limit) {
            let step = i + 1;
            controller.restore(&from)?;
            let process = controller.process_name(thread).unwrap_or_default();

            if self.config.verify_hashes {
                controller
                    .execute(thread)
                    .map_err(|source| ReplayError::Fault {
                        step,
                        thread,
                        source,
                    })?;
                let produced = controller.commit()?;
                if !produced.contains(&to) {
                    return Err(ReplayError::Divergence {
                        step,
                        expected: to.short(),
                        produced: produced.iter().map(|h| h.short()).collect(),
                    });
                }
            }

            controller.restore(&to)?;
            let before = controller.snapshot(&from)?;
            let after = controller.snapshot(&to)?;
            let changes = SnapshotDiff::compute(&before, &after);
            tracing::debug!(step, thread = %thread, from = %from.short(), to = %to.short(), "replayed step");

            report.steps.push(ReplayStep {
                step,
                thread,
                process,
                from,
                to,
                state: controller.state_to_string(),
                changes,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timewinder_check::{CheckError, Evaluator, Spec};
    use timewinder_core::{Hash, Value};
    use timewinder_runtime::{ObjectModel, StepProcess};

    fn overdraft() -> Evaluator {
        let mut sc = StateController::new();
        sc.mount(ObjectModel::new("alice", "Account").with_field("acc", 5))
            .unwrap();
        sc.mount_process(
            "_thread_0",
            StepProcess::new("withdraw")
                .step("withdraw", |ctx| {
                    let alice = ctx.object_mut("alice")?;
                    let acc = alice.int("acc")?;
                    alice.set("acc", acc - 3);
                    Ok(())
                })
                .step("again", |ctx| {
                    let alice = ctx.object_mut("alice")?;
                    let acc = alice.int("acc")?;
                    alice.set("acc", acc - 3);
                    Ok(())
                }),
        )
        .unwrap();
        Evaluator::new(sc).with_spec(Spec::always_fn("alice_non_negative", |m| {
            Ok(m.object("alice")?.int("acc")? >= 0)
        }))
    }

    fn counterexample(ev: &mut Evaluator) -> EvalThunk {
        match ev.evaluate() {
            Err(CheckError::SafetyViolation(v)) => v.thunk,
            other => panic!("expected violation, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_counterexample() {
        let mut ev = overdraft();
        let thunk = counterexample(&mut ev);
        assert_eq!(thunk.len(), 2);

        let report = ReplayEngine::new()
            .replay(ev.controller_mut(), &thunk)
            .unwrap();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].process, "withdraw@withdraw");
        assert_eq!(report.steps[1].process, "withdraw@again");
        assert_eq!(report.final_hash(), thunk.state_hash());

        let change = report.steps[1].changes.get("alice.acc").unwrap();
        assert_eq!(change.old, Some(Value::Int(2)));
        assert_eq!(change.new, Some(Value::Int(-1)));

        let text = report.to_string();
        assert!(text.starts_with("Initial State:\n"));
        assert!(text.contains("Step 2, thread 0 executes (withdraw@again)"));
        assert!(text.contains(&format!("{} -- 0 --> {}", thunk.hashes[1].short(), thunk.hashes[2].short())));
    }

    #[test]
    fn test_replay_idempotent() {
        let mut ev = overdraft();
        let thunk = counterexample(&mut ev);
        let engine = ReplayEngine::new();
        let first = engine.replay(ev.controller_mut(), &thunk).unwrap();
        let second = engine.replay(ev.controller_mut(), &thunk).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_replay_max_steps() {
        let mut ev = overdraft();
        let thunk = counterexample(&mut ev);
        let report = ReplayEngine::new()
            .with_config(ReplayConfig::default().with_max_steps(1))
            .replay(ev.controller_mut(), &thunk)
            .unwrap();
        assert_eq!(report.steps.len(), 1);
    }

    #[test]
    fn test_replay_divergence() {
        let mut ev = overdraft();
        let mut thunk = counterexample(&mut ev);
        // Claim the second step went back to the initial state.
        thunk.hashes[2] = thunk.hashes[0];
        let err = ReplayEngine::new()
            .replay(ev.controller_mut(), &thunk)
            .unwrap_err();
        assert!(matches!(err, ReplayError::Divergence { step: 2, .. }));

        // Without re-execution the recorded states are trusted.
        let report = ReplayEngine::new()
            .with_config(ReplayConfig::default().with_verify_hashes(false))
            .replay(ev.controller_mut(), &thunk)
            .unwrap();
        assert_eq!(report.final_hash(), thunk.hashes[0]);
    }

    #[test]
    fn test_replay_malformed() {
        let mut ev = overdraft();
        let mut thunk = counterexample(&mut ev);
        thunk.hashes.pop();
        assert!(matches!(
            ReplayEngine::new().replay(ev.controller_mut(), &thunk),
            Err(ReplayError::MalformedThunk { hashes: 2, steps: 2 })
        ));

        thunk.hashes.clear();
        assert!(matches!(
            ReplayEngine::new().replay(ev.controller_mut(), &thunk),
            Err(ReplayError::EmptyPath)
        ));
    }

    #[test]
    fn test_replay_unknown_state() {
        let mut ev = overdraft();
        let thunk = EvalThunk::new(Hash::compute(b"nowhere"), 0);
        assert!(matches!(
            ReplayEngine::new().replay(ev.controller_mut(), &thunk),
            Err(ReplayError::Core(CoreError::UnknownHash { .. }))
        ));
    }

    #[test]
    fn test_report_json() {
        let mut ev = overdraft();
        let thunk = counterexample(&mut ev);
        let report = ReplayEngine::new()
            .replay(ev.controller_mut(), &thunk)
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["thread"], 0);
        assert_eq!(json["initial"], thunk.initial_hash().to_hex());
    }
}
