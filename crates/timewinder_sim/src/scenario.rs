//! Registry of the reference scenarios.

use crate::{accounts, condwait, queue};
use serde::{Deserialize, Serialize};
use std::fmt;
use timewinder_check::{CheckError, CheckResult, Evaluator, EvaluatorConfig, EvaluatorStats};
use timewinder_core::{ChoiceSet, CoreResult};

/// How a scenario is known to end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expected {
    /// Every specification holds
    Holds,
    /// A safety specification fails
    SafetyViolation,
    /// A liveness specification fails
    LivenessViolation,
    /// A process step faults
    ProcessFault,
}

impl Expected {
    /// Classify a run outcome
    #[must_use]
    pub fn of(result: &CheckResult<EvaluatorStats>) -> Option<Self> {
        match result {
            Ok(_) => Some(Self::Holds),
            Err(err) => Self::of_error(err),
        }
    }

    /// Classify a failed run; usage errors have no outcome
    #[must_use]
    pub fn of_error(err: &CheckError) -> Option<Self> {
        match err {
            CheckError::SafetyViolation(_) => Some(Self::SafetyViolation),
            CheckError::LivenessViolation(_) => Some(Self::LivenessViolation),
            CheckError::ProcessFault { .. } => Some(Self::ProcessFault),
            CheckError::Usage(_) => None,
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Holds => "holds",
            Self::SafetyViolation => "safety violation",
            Self::LivenessViolation => "liveness violation",
            Self::ProcessFault => "process fault",
        };
        f.pad(s)
    }
}

/// A named, buildable system with a known outcome
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    /// Name used on the command line
    pub name: &'static str,
    /// One-line description
    pub summary: &'static str,
    /// Step budget the outcome is known for (`None` = until fixpoint)
    pub steps: Option<usize>,
    /// Known outcome
    pub expected: Expected,
    build: fn() -> CoreResult<Evaluator>,
}

impl Scenario {
    /// Build a fresh evaluator, with the scenario's step budget unless
    /// `config` is given
    ///
    /// # Errors
    ///
    /// Returns error if the scenario's mounts collide
    pub fn build(&self, config: Option<EvaluatorConfig>) -> CoreResult<Evaluator> {
        let config = config.unwrap_or_else(|| EvaluatorConfig {
            max_steps: self.steps,
            ..EvaluatorConfig::default()
        });
        tracing::debug!(scenario = self.name, steps = ?config.max_steps, "building scenario");
        Ok((self.build)()?.with_config(config))
    }
}

fn overdraft() -> CoreResult<Evaluator> {
    accounts::overdraft(6)
}

fn transfers() -> CoreResult<Evaluator> {
    accounts::transfers(false, &ChoiceSet::in_range(1, 5))
}

fn guarded_transfers() -> CoreResult<Evaluator> {
    accounts::transfers(true, &ChoiceSet::in_range(1, 4))
}

fn settlement() -> CoreResult<Evaluator> {
    accounts::settlement(&ChoiceSet::in_range(0, 2))
}

fn queue_waiting() -> CoreResult<Evaluator> {
    queue::pipeline(queue::waiting_writer(), queue::waiting_reader())
}

fn queue_overflow() -> CoreResult<Evaluator> {
    queue::pipeline(queue::eager_writer(), queue::waiting_reader())
}

fn queue_underflow() -> CoreResult<Evaluator> {
    queue::pipeline(queue::waiting_writer(), queue::eager_reader())
}

fn condwait_live() -> CoreResult<Evaluator> {
    condwait::bounded_queue(1, 1, 1)
}

fn condwait_deadlock() -> CoreResult<Evaluator> {
    condwait::bounded_queue(2, 1, 1)
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "overdraft",
        summary: "one unguarded transfer of 6 from a balance of 5",
        steps: Some(5),
        expected: Expected::SafetyViolation,
        build: overdraft,
    },
    Scenario {
        name: "transfers",
        summary: "two unguarded transfers of 1..=5 racing on the same account",
        steps: Some(10),
        expected: Expected::SafetyViolation,
        build: transfers,
    },
    Scenario {
        name: "guarded-transfers",
        summary: "two transfers of 1..=4 that check funds before withdrawing",
        steps: None,
        expected: Expected::Holds,
        build: guarded_transfers,
    },
    Scenario {
        name: "settlement",
        summary: "a transfer of 0..=2 must eventually credit the receiver",
        steps: None,
        expected: Expected::LivenessViolation,
        build: settlement,
    },
    Scenario {
        name: "queue",
        summary: "writer waits at capacity, reader waits while empty",
        steps: None,
        expected: Expected::Holds,
        build: queue_waiting,
    },
    Scenario {
        name: "queue-overflow",
        summary: "writer ignores capacity",
        steps: Some(10),
        expected: Expected::SafetyViolation,
        build: queue_overflow,
    },
    Scenario {
        name: "queue-underflow",
        summary: "reader pops without checking for messages",
        steps: Some(5),
        expected: Expected::ProcessFault,
        build: queue_underflow,
    },
    Scenario {
        name: "condwait",
        summary: "one producer and one consumer sharing a condition variable",
        steps: None,
        expected: Expected::Holds,
        build: condwait_live,
    },
    Scenario {
        name: "condwait-deadlock",
        summary: "two producers and one consumer sharing a condition variable",
        steps: None,
        expected: Expected::SafetyViolation,
        build: condwait_deadlock,
    },
];

/// Every reference scenario
#[must_use]
pub fn scenarios() -> &'static [Scenario] {
    SCENARIOS
}

/// Look up a scenario by name
#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}
