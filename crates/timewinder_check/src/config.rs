//! Evaluator configuration.

use serde::{Deserialize, Serialize};
use timewinder_storage::CasConfig;

/// When liveness specifications are decided
///
/// A path whose next state is already on it is decided under either
/// trigger, as the run that repeats that loop forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessTrigger {
    /// At states where no process can run
    #[default]
    FinalState,
    /// Also on every unexpanded path when the step budget runs out
    FinalStateOrBudget,
}

/// Evaluator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Exploration rounds before stopping (`None` = until fixpoint)
    pub max_steps: Option<usize>,
    /// Liveness decision policy
    pub liveness: LivenessTrigger,
    /// Content store limits
    pub cas: CasConfig,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(5),
            liveness: LivenessTrigger::FinalState,
            cas: CasConfig::default(),
        }
    }
}

impl EvaluatorConfig {
    /// Set the step budget
    #[must_use]
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Explore until no new states remain
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.max_steps = None;
        self
    }

    /// Set the liveness policy
    #[must_use]
    pub fn with_liveness(mut self, liveness: LivenessTrigger) -> Self {
        self.liveness = liveness;
        self
    }

    /// Set content store limits
    #[must_use]
    pub fn with_cas(mut self, cas: CasConfig) -> Self {
        self.cas = cas;
        self
    }
}
