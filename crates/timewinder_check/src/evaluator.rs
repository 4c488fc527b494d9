//! Breadth-first state exploration.
//!
//! Each round expands every path on the frontier by one step of every
//! runnable process. A state is expanded at most once per run; paths that
//! reach an already expanded state are dropped. Predicates are evaluated
//! once per expanded state and appended to the path's traces, then safety
//! specifications are decided on the whole trace so far.
//!
//! Liveness specifications are decided where a path can no longer grow: at
//! a state where no process can run, and on a path whose next state is
//! already on it. Such a path is read as the run that repeats its loop
//! forever. A path that joins a state first reached by another path is not
//! checked.

use crate::config::{EvaluatorConfig, LivenessTrigger};
use crate::error::{CheckError, CheckResult, Violation};
use crate::ltl::Formula;
use crate::predicate::Predicate;
use crate::spec::Spec;
use crate::thunk::EvalThunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use timewinder_core::Hash;
use timewinder_runtime::StateController;
use timewinder_storage::Cas;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    /// Process steps executed
    pub thread_executions: u64,
    /// Distinct states expanded
    pub states: u64,
    /// Distinct snapshots in the content store
    pub cas_objects: usize,
    /// Rounds run
    pub steps: u64,
    /// Expanded states where no process could run
    pub final_states: u64,
}

struct Compiled {
    name: String,
    formula: Formula,
    liveness: bool,
}

/// Explores a controller's state space against a set of specifications
pub struct Evaluator {
    controller: StateController,
    config: EvaluatorConfig,
    specs: Vec<Spec>,
    columns: Vec<Arc<dyn Predicate>>,
    compiled: Vec<Compiled>,
    initial: Option<Vec<Hash>>,
    visited: HashSet<Hash>,
    stats: EvaluatorStats,
}

impl Evaluator {
    /// Create an evaluator over a fully mounted controller
    #[must_use]
    pub fn new(controller: StateController) -> Self {
        Self {
            controller,
            config: EvaluatorConfig::default(),
            specs: Vec::new(),
            columns: Vec::new(),
            compiled: Vec::new(),
            initial: None,
            visited: HashSet::new(),
            stats: EvaluatorStats::default(),
        }
    }

    /// Create with custom config
    #[must_use]
    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.controller.set_cas_config(config.cas.clone());
        self.config = config;
        self
    }

    /// Builder-style [`Evaluator::add_spec`]
    #[must_use]
    pub fn with_spec(mut self, spec: impl Into<Spec>) -> Self {
        self.add_spec(spec);
        self
    }

    /// Register a specification
    pub fn add_spec(&mut self, spec: impl Into<Spec>) {
        self.specs.push(spec.into());
    }

    /// Registered specifications
    #[must_use]
    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// The explored controller
    #[must_use]
    pub fn controller(&self) -> &StateController {
        &self.controller
    }

    /// The explored controller, e.g. to replay a path
    pub fn controller_mut(&mut self) -> &mut StateController {
        &mut self.controller
    }

    /// Predicates in column order, as assigned by the last run
    #[must_use]
    pub fn predicates(&self) -> &[Arc<dyn Predicate>] {
        &self.columns
    }

    /// Compiled formulas as JSON trees, in registration order
    #[must_use]
    pub fn formula_trees(&self) -> Vec<serde_json::Value> {
        self.compiled.iter().map(|c| c.formula.to_tree()).collect()
    }

    /// Counters of the last run, also after it failed
    #[must_use]
    pub fn stats(&self) -> EvaluatorStats {
        EvaluatorStats {
            cas_objects: self.controller.cas().size(),
            ..self.stats.clone()
        }
    }

    /// Explore with the configured step budget
    ///
    /// # Errors
    ///
    /// Returns the first violation or fault found
    pub fn evaluate(&mut self) -> CheckResult<EvaluatorStats> {
        self.evaluate_steps(self.config.max_steps)
    }

    /// Explore for at most `steps` rounds (`None` = until fixpoint)
    ///
    /// States stored by an earlier run are dropped first, so paths from that
    /// run can no longer be replayed.
    ///
    /// # Errors
    ///
    /// Returns the first violation or fault found
    pub fn evaluate_steps(&mut self, steps: Option<usize>) -> CheckResult<EvaluatorStats> {
        self.stats = EvaluatorStats::default();
        self.visited.clear();
        self.compile_specs();

        let columns = self.columns.len();
        let initial = self.initial_states()?;
        self.controller.retain_snapshots(&initial);
        let mut frontier: Vec<EvalThunk> = initial
            .into_iter()
            .map(|h| EvalThunk::new(h, columns))
            .collect();

        let mut round = 0usize;
        loop {
            if frontier.is_empty() {
                tracing::info!(rounds = round, states = self.stats.states, "no more states to evaluate");
                break;
            }
            if steps.is_some_and(|max| round >= max) {
                tracing::info!(
                    rounds = round,
                    pending = frontier.len(),
                    "step budget exhausted"
                );
                if self.config.liveness == LivenessTrigger::FinalStateOrBudget {
                    for thunk in frontier {
                        self.check_unfinished(thunk)?;
                    }
                }
                break;
            }

            round += 1;
            self.stats.steps += 1;
            tracing::info!(round, frontier = frontier.len(), "evaluating round");

            let mut next = Vec::new();
            for thunk in frontier {
                next.extend(self.expand(thunk)?);
            }
            frontier = next;
        }

        Ok(self.stats())
    }

    /// Hashes of the mounted configuration, committed on the first run
    ///
    /// Later runs start from the same states even though the controller has
    /// since been restored elsewhere.
    fn initial_states(&mut self) -> CheckResult<Vec<Hash>> {
        if let Some(initial) = &self.initial {
            return Ok(initial.clone());
        }
        let initial = self.controller.commit()?;
        self.initial = Some(initial.clone());
        Ok(initial)
    }

    fn compile_specs(&mut self) {
        let mut columns = Vec::new();
        self.compiled = self
            .specs
            .iter()
            .map(|spec| Compiled {
                name: spec.name().to_string(),
                formula: spec.ltl().compile(&mut columns),
                liveness: spec.is_liveness(),
            })
            .collect();
        self.columns = columns;
    }

    fn expand(&mut self, mut thunk: EvalThunk) -> CheckResult<Vec<EvalThunk>> {
        let hash = thunk.state_hash();
        if !self.visited.insert(hash) {
            return Ok(Vec::new());
        }
        self.stats.states += 1;

        self.controller.restore(&hash)?;
        self.eval_predicates(&mut thunk)?;
        self.check_safety(&thunk)?;

        let runnable = match thunk.must_run {
            Some(tid) => vec![tid],
            None => self.controller.runnable(),
        };
        if runnable.is_empty() {
            self.stats.final_states += 1;
            tracing::debug!(state = %hash.short(), depth = thunk.len(), "final state");
            self.check_liveness(&thunk)?;
            return Ok(Vec::new());
        }

        let liveness = self.compiled.iter().any(|c| c.liveness);
        let mut successors = Vec::new();
        for (i, tid) in runnable.into_iter().enumerate() {
            // The first execution starts from the state restored above.
            if i > 0 {
                self.controller.restore(&hash)?;
            }
            self.stats.thread_executions += 1;

            let process = self.controller.process_name(tid).unwrap_or_default();
            let cont = self
                .controller
                .execute(tid)
                .map_err(|source| CheckError::ProcessFault {
                    process,
                    thread: tid,
                    source,
                    thunk: Box::new(thunk.clone()),
                })?;
            let must_run = cont.is_immediate().then_some(tid);

            for next in self.controller.commit()? {
                let path = thunk.extend(tid, next, must_run);
                let loop_start = liveness
                    .then(|| thunk.hashes.iter().position(|h| *h == next))
                    .flatten();
                if let Some(loop_start) = loop_start {
                    self.check_lasso(&path, loop_start)?;
                }
                successors.push(path);
            }
        }
        Ok(successors)
    }

    fn eval_predicates(&self, thunk: &mut EvalThunk) -> CheckResult<()> {
        let models = self.controller.models();
        for (column, predicate) in thunk.predicate_traces.iter_mut().zip(&self.columns) {
            column.push(predicate.check(models)?);
        }
        Ok(())
    }

    fn check_safety(&self, thunk: &EvalThunk) -> CheckResult<()> {
        for spec in self.compiled.iter().filter(|c| !c.liveness) {
            if !spec.formula.holds(&thunk.predicate_traces) {
                tracing::warn!(spec = %spec.name, depth = thunk.len(), "safety violation");
                return Err(CheckError::SafetyViolation(Box::new(
                    self.violation(spec, thunk),
                )));
            }
        }
        Ok(())
    }

    fn check_liveness(&self, thunk: &EvalThunk) -> CheckResult<()> {
        for spec in self.compiled.iter().filter(|c| c.liveness) {
            if !spec.formula.holds(&thunk.predicate_traces) {
                tracing::warn!(spec = %spec.name, depth = thunk.len(), "liveness violation");
                return Err(CheckError::LivenessViolation(Box::new(
                    self.violation(spec, thunk),
                )));
            }
        }
        Ok(())
    }

    /// Decide liveness on a path whose last step returns to `loop_start`
    fn check_lasso(&self, path: &EvalThunk, loop_start: usize) -> CheckResult<()> {
        for spec in self.compiled.iter().filter(|c| c.liveness) {
            if !spec.formula.holds_lasso(&path.predicate_traces, loop_start) {
                tracing::warn!(
                    spec = %spec.name,
                    depth = path.len(),
                    loop_start,
                    "liveness violation on a loop"
                );
                return Err(CheckError::LivenessViolation(Box::new(
                    self.violation(spec, path),
                )));
            }
        }
        Ok(())
    }

    /// Decide liveness on a path cut off by the step budget
    fn check_unfinished(&mut self, mut thunk: EvalThunk) -> CheckResult<()> {
        self.controller.restore(&thunk.state_hash())?;
        self.eval_predicates(&mut thunk)?;
        self.check_liveness(&thunk)
    }

    fn violation(&self, spec: &Compiled, thunk: &EvalThunk) -> Violation {
        Violation {
            spec: spec.name.clone(),
            thunk: thunk.clone(),
            state: self.controller.state_to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltl::Ltl;
    use crate::predicate::FnPredicate;
    use timewinder_core::ChoiceSet;
    use timewinder_runtime::{ObjectModel, StepFault, StepProcess, ThreadId};

    fn counter(name: &str) -> ObjectModel {
        ObjectModel::new(name, "Counter").with_field("n", 0)
    }

    fn bump(label: &str, target: &'static str, times: usize) -> StepProcess {
        let mut p = StepProcess::new(label);
        for i in 0..times {
            p = p.step(format!("bump{}", i), move |ctx| {
                let c = ctx.object_mut(target)?;
                let n = c.int("n")?;
                c.set("n", n + 1);
                Ok(())
            });
        }
        p
    }

    fn withdraw(amount: i64) -> StateController {
        let mut sc = StateController::new();
        sc.mount(ObjectModel::new("alice", "Account").with_field("acc", 5))
            .unwrap();
        sc.mount_process(
            "_thread_0",
            StepProcess::new("withdraw").step("withdraw", move |ctx| {
                let alice = ctx.object_mut("alice")?;
                let acc = alice.int("acc")?;
                alice.set("acc", acc - amount);
                Ok(())
            }),
        )
        .unwrap();
        sc
    }

    fn non_negative() -> Spec {
        Spec::always_fn("alice_non_negative", |m| {
            Ok(m.object("alice")?.int("acc")? >= 0)
        })
    }

    #[test]
    fn test_safety_violation() {
        let mut ev = Evaluator::new(withdraw(6)).with_spec(non_negative());
        let err = ev.evaluate().unwrap_err();
        let CheckError::SafetyViolation(violation) = &err else {
            panic!("expected safety violation, got {err:?}");
        };
        assert_eq!(violation.spec, "[](alice_non_negative)");
        assert_eq!(violation.thunk.trace, vec![ThreadId(0)]);
        assert_eq!(violation.thunk.predicate_traces, vec![vec![true, false]]);
        assert!(violation.state.contains("alice:"));
        assert_eq!(ev.stats().states, 2);
    }

    #[test]
    fn test_safe_run() {
        let mut ev = Evaluator::new(withdraw(3)).with_spec(non_negative());
        let stats = ev.evaluate().unwrap();
        assert_eq!(stats.states, 2);
        assert_eq!(stats.final_states, 1);
        assert_eq!(stats.thread_executions, 1);
        assert_eq!(stats.steps, 2);
        assert_eq!(stats.cas_objects, 2);
    }

    #[test]
    fn test_interleavings_deduplicated() {
        let mut sc = StateController::new();
        sc.mount(counter("a")).unwrap();
        sc.mount(counter("b")).unwrap();
        sc.mount_process("p", bump("p", "a", 2)).unwrap();
        sc.mount_process("q", bump("q", "b", 2)).unwrap();

        let mut ev = Evaluator::new(sc);
        let stats = ev.evaluate_steps(None).unwrap();
        // A 3x3 grid of (p.pc, q.pc) with two outgoing edges per inner state.
        assert_eq!(stats.states, 9);
        assert_eq!(stats.thread_executions, 12);
        assert_eq!(stats.final_states, 1);
        assert!(stats.thread_executions <= stats.states * 2);
    }

    #[test]
    fn test_step_budget() {
        let mut ev = Evaluator::new(spinner()).with_config(EvaluatorConfig::default().with_max_steps(3));
        let stats = ev.evaluate().unwrap();
        assert_eq!(stats.steps, 3);
        assert_eq!(stats.states, 3);
        assert_eq!(stats.final_states, 0);
    }

    fn flag_setter(sets: bool) -> StateController {
        let mut sc = StateController::new();
        sc.mount(ObjectModel::new("flag", "Flag").with_field("up", false))
            .unwrap();
        sc.mount_process(
            "setter",
            StepProcess::new("setter")
                .step("work", |_| Ok(()))
                .step("raise", move |ctx| {
                    ctx.object_mut("flag")?.set("up", sets);
                    Ok(())
                }),
        )
        .unwrap();
        sc
    }

    fn eventually_up() -> Spec {
        let up: Arc<dyn Predicate> = Arc::new(FnPredicate::new("flag_up", |m| {
            m.object("flag")?.bool("up")
        }));
        Spec::new(Ltl::eventually(up))
    }

    #[test]
    fn test_liveness_at_final_state() {
        let mut ev = Evaluator::new(flag_setter(true)).with_spec(eventually_up());
        assert!(ev.evaluate().is_ok());

        let mut ev = Evaluator::new(flag_setter(false)).with_spec(eventually_up());
        let err = ev.evaluate().unwrap_err();
        let CheckError::LivenessViolation(violation) = err else {
            panic!("expected liveness violation");
        };
        assert_eq!(violation.spec, "<>(flag_up)");
        assert_eq!(violation.thunk.len(), 2);
    }

    #[test]
    fn test_liveness_not_checked_midway() {
        // The flag only goes up at the last step, so any earlier decision
        // would be a false alarm.
        let mut ev = Evaluator::new(flag_setter(true))
            .with_spec(eventually_up())
            .with_config(EvaluatorConfig::default().unbounded());
        let stats = ev.evaluate().unwrap();
        assert_eq!(stats.states, 3);
    }

    #[test]
    fn test_liveness_on_budget() {
        let mut ev = Evaluator::new(flag_setter(true))
            .with_spec(eventually_up())
            .with_config(EvaluatorConfig::default().with_max_steps(1));
        assert!(ev.evaluate().is_ok());

        let mut ev = Evaluator::new(flag_setter(true))
            .with_spec(eventually_up())
            .with_config(
                EvaluatorConfig::default()
                    .with_max_steps(1)
                    .with_liveness(LivenessTrigger::FinalStateOrBudget),
            );
        assert!(matches!(
            ev.evaluate(),
            Err(CheckError::LivenessViolation(_))
        ));
    }

    fn flag_looper(toggles: bool) -> StateController {
        let mut sc = StateController::new();
        sc.mount(ObjectModel::new("flag", "Flag").with_field("up", false))
            .unwrap();
        sc.mount_process(
            "looper",
            StepProcess::new("looper").step("spin", move |ctx| {
                if toggles {
                    let flag = ctx.object_mut("flag")?;
                    let up = flag.bool("up")?;
                    flag.set("up", !up);
                }
                ctx.goto("spin");
                Ok(())
            }),
        )
        .unwrap();
        sc
    }

    #[test]
    fn test_liveness_on_loop() {
        let mut ev = Evaluator::new(flag_looper(false))
            .with_spec(eventually_up())
            .with_config(EvaluatorConfig::default().unbounded());
        let err = ev.evaluate().unwrap_err();
        let CheckError::LivenessViolation(violation) = err else {
            panic!("expected liveness violation");
        };
        assert_eq!(violation.spec, "<>(flag_up)");
        // The closing step leads back to the initial state.
        assert_eq!(violation.thunk.len(), 1);
        assert_eq!(violation.thunk.state_hash(), violation.thunk.initial_hash());
        assert_eq!(ev.stats().final_states, 0);

        let mut ev = Evaluator::new(flag_looper(false))
            .with_spec(eventually_up())
            .with_config(
                EvaluatorConfig::default()
                    .with_max_steps(50)
                    .with_liveness(LivenessTrigger::FinalStateOrBudget),
            );
        assert!(matches!(
            ev.evaluate(),
            Err(CheckError::LivenessViolation(_))
        ));
    }

    #[test]
    fn test_liveness_holds_on_loop() {
        let up: Arc<dyn Predicate> = Arc::new(FnPredicate::new("flag_up", |m| {
            m.object("flag")?.bool("up")
        }));
        let mut ev = Evaluator::new(flag_looper(true))
            .with_spec(Ltl::eventually(Arc::clone(&up)))
            .with_spec(Ltl::leads_to(Ltl::not(Arc::clone(&up)), up))
            .with_config(EvaluatorConfig::default().unbounded());
        let stats = ev.evaluate().unwrap();
        assert_eq!(stats.states, 2);
        assert_eq!(stats.final_states, 0);
    }

    #[test]
    fn test_loops_ignored_without_liveness() {
        let mut ev = Evaluator::new(flag_looper(false))
            .with_config(EvaluatorConfig::default().unbounded());
        let stats = ev.evaluate().unwrap();
        assert_eq!(stats.states, 1);
        assert_eq!(stats.thread_executions, 1);
    }

    #[test]
    fn test_process_fault() {
        let mut sc = StateController::new();
        sc.mount_process(
            "broken",
            StepProcess::new("broken").step("boom", |ctx| ctx.ensure(false, "boom")),
        )
        .unwrap();
        let mut ev = Evaluator::new(sc);
        match ev.evaluate() {
            Err(CheckError::ProcessFault {
                process,
                thread,
                source,
                thunk,
            }) => {
                assert_eq!(process, "broken@boom");
                assert_eq!(thread, ThreadId(0));
                assert_eq!(source, StepFault::Assertion("boom".to_string()));
                assert!(thunk.is_empty());
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_initial_choice_seeds_frontier() {
        let mut sc = StateController::new();
        sc.mount_process(
            "p",
            StepProcess::new("p")
                .with_local("x", ChoiceSet::in_range(1, 3))
                .step("noop", |_| Ok(())),
        )
        .unwrap();
        let stats = Evaluator::new(sc).evaluate().unwrap();
        assert_eq!(stats.states, 6);
        assert_eq!(stats.final_states, 3);
    }

    #[test]
    fn test_immediate_yield_pins_thread() {
        let mut sc = StateController::new();
        sc.mount_process(
            "a",
            StepProcess::new("a")
                .step("choose", |ctx| {
                    ctx.choose("x", ChoiceSet::in_range(1, 2));
                    Ok(())
                })
                .step("use", |ctx| {
                    ctx.local_int("x")?;
                    Ok(())
                }),
        )
        .unwrap();
        sc.mount_process("b", StepProcess::new("b").step("noop", |_| Ok(())))
            .unwrap();

        let stats = Evaluator::new(sc).evaluate_steps(None).unwrap();
        assert_eq!(stats.states, 10);
        // States right after the choice only run `a`.
        assert_eq!(stats.thread_executions, 9);
        assert_eq!(stats.final_states, 2);
    }

    #[test]
    fn test_empty_choice_prunes_branch() {
        let mut sc = StateController::new();
        sc.mount_process(
            "p",
            StepProcess::new("p").step("choose", |ctx| {
                ctx.choose("x", ChoiceSet::new(Vec::<i64>::new()));
                Ok(())
            }),
        )
        .unwrap();
        let stats = Evaluator::new(sc).evaluate().unwrap();
        assert_eq!(stats.states, 1);
        assert_eq!(stats.final_states, 0);
    }

    #[test]
    fn test_usage_error_from_predicate() {
        let mut ev = Evaluator::new(withdraw(1)).with_spec(Spec::always_fn("bad", |m| {
            Ok(m.object("nobody")?.int("acc")? > 0)
        }));
        assert!(matches!(ev.evaluate(), Err(CheckError::Usage(_))));
    }

    #[test]
    fn test_shared_predicate_single_column() {
        let up: Arc<dyn Predicate> = Arc::new(FnPredicate::new("flag_up", |m| {
            m.object("flag")?.bool("up")
        }));
        let mut ev = Evaluator::new(flag_setter(true))
            .with_spec(Ltl::eventually(Arc::clone(&up)))
            .with_spec(Ltl::leads_to(Ltl::not(Arc::clone(&up)), up));
        ev.evaluate().unwrap();
        assert_eq!(ev.predicates().len(), 1);
        assert_eq!(
            ev.formula_trees(),
            vec![
                serde_json::json!({"eventually": 0}),
                serde_json::json!({"leads_to": [{"inverse": 0}, 0]}),
            ]
        );
    }

    #[test]
    fn test_rerun_resets_stats() {
        let mut ev = Evaluator::new(withdraw(3));
        let first = ev.evaluate().unwrap();
        let second = ev.evaluate().unwrap();
        assert_eq!(first, second);
    }

    fn spinner() -> StateController {
        let mut sc = StateController::new();
        sc.mount(counter("c")).unwrap();
        sc.mount_process(
            "spin",
            StepProcess::new("spin").step("inc", |ctx| {
                let c = ctx.object_mut("c")?;
                let n = c.int("n")?;
                c.set("n", n + 1);
                ctx.goto("inc");
                Ok(())
            }),
        )
        .unwrap();
        sc
    }

    #[test]
    fn test_rerun_counts_only_its_own_snapshots() {
        let mut ev = Evaluator::new(spinner());
        assert_eq!(ev.evaluate_steps(Some(3)).unwrap().cas_objects, 4);

        let second = ev.evaluate_steps(Some(1)).unwrap();
        let fresh = Evaluator::new(spinner()).evaluate_steps(Some(1)).unwrap();
        assert_eq!(second, fresh);
        assert_eq!(second.cas_objects, 2);
    }
}
