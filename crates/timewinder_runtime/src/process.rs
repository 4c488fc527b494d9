//! Steppable processes.
//!
//! A process advances in atomic steps. Each call to [`Process::execute`] runs
//! exactly one step against the mounted models and reports how control should
//! continue. Everything a process needs to resume lives in its snapshot, so
//! restoring a state also restores where every process was.

use crate::model::{Models, ObjectModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use timewinder_core::{ChoiceSet, CoreError, CoreResult, Snapshot, Value};

/// Index of a mounted process, in mount order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub usize);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling hint attached to a yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Fairness {
    /// No constraint
    #[default]
    Normal,
    /// Reserved
    WeaklyFair,
    /// Reserved
    Fair,
    /// The same process must run next
    Immediate,
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Step finished, more steps remain
    Normal,
    /// Step paused with a tag and scheduling hint
    Yield {
        /// What caused the pause
        tag: String,
        /// How the scheduler must treat the pause
        fairness: Fairness,
    },
    /// No steps remain
    Done,
}

impl Continuation {
    /// True if the scheduler must re-select the same process next
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            Self::Yield {
                fairness: Fairness::Immediate,
                ..
            }
        )
    }
}

/// Fault raised inside a step
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepFault {
    /// Model or state access failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A step assertion did not hold
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// Jump to a step that does not exist
    #[error("No step named {0}")]
    UnknownStep(String),

    /// The process was executed after it finished
    #[error("Process is not runnable")]
    NotRunnable,

    /// Any other step failure
    #[error("{0}")]
    Custom(String),
}

/// A steppable entity
pub trait Process {
    /// Diagnostic name reflecting the current step
    fn name(&self) -> String;

    /// Current state, including where the process will resume
    fn get_state(&self) -> Snapshot;

    /// Replace the current state
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot does not describe this process
    fn set_state(&mut self, state: Snapshot) -> CoreResult<()>;

    /// True if another step can run
    fn can_execute(&self) -> bool;

    /// Run one step
    ///
    /// # Errors
    ///
    /// Returns [`StepFault`] if the step fails
    fn execute(&mut self, models: &mut Models) -> Result<Continuation, StepFault>;
}

type StepFn = Box<dyn Fn(&mut StepContext<'_>) -> Result<(), StepFault>>;

struct Step {
    name: String,
    run: StepFn,
}

/// Where control goes after the current step
#[derive(Debug, Clone, PartialEq, Eq)]
enum Flow {
    Next,
    Goto(String),
    Stop,
}

/// What a running step can see and do
pub struct StepContext<'a> {
    models: &'a mut Models,
    locals: &'a mut Snapshot,
    label: &'a str,
    flow: Flow,
    pause: Option<(String, Fairness)>,
}

impl<'a> StepContext<'a> {
    /// Mounted models
    #[must_use]
    pub fn models(&self) -> &Models {
        &*self.models
    }

    /// Mutable mounted models
    pub fn models_mut(&mut self) -> &mut Models {
        &mut *self.models
    }

    /// Get an object model
    ///
    /// # Errors
    ///
    /// Returns error if no object has this name
    pub fn object(&self, name: &str) -> Result<&ObjectModel, StepFault> {
        Ok(self.models.object(name)?)
    }

    /// Get a mutable object model
    ///
    /// # Errors
    ///
    /// Returns error if no object has this name
    pub fn object_mut(&mut self, name: &str) -> Result<&mut ObjectModel, StepFault> {
        Ok(self.models.object_mut(name)?)
    }

    /// Get a local
    ///
    /// # Errors
    ///
    /// Returns error if the local is not set
    pub fn local(&self, name: &str) -> Result<&Value, StepFault> {
        self.locals.get(name).ok_or_else(|| {
            StepFault::Core(CoreError::FieldNotFound {
                owner: self.label.to_string(),
                field: name.to_string(),
            })
        })
    }

    /// Get an integer local
    ///
    /// # Errors
    ///
    /// Returns error if the local is not set or not an integer
    pub fn local_int(&self, name: &str) -> Result<i64, StepFault> {
        let path = format!("{}.{}", self.label, name);
        Ok(self.local(name)?.expect_int(&path)?)
    }

    /// Set a local
    pub fn set_local(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.locals.insert(name, value);
    }

    /// Store a nondeterministic choice in a local and pause
    ///
    /// The pause is immediate: the next commit resolves the choice into one
    /// successor per candidate and this process runs again in each of them.
    pub fn choose(&mut self, name: impl Into<String>, choices: ChoiceSet) {
        let name = name.into();
        let tag = format!("NonDeterminism({})", name);
        self.locals.insert(name, choices);
        self.pause = Some((tag, Fairness::Immediate));
    }

    /// Pause after this step, letting any process run next
    pub fn pause(&mut self, tag: impl Into<String>) {
        self.pause = Some((tag.into(), Fairness::Normal));
    }

    /// Continue at the named step instead of the next one
    pub fn goto(&mut self, step: impl Into<String>) {
        self.flow = Flow::Goto(step.into());
    }

    /// Finish the process after this step
    pub fn stop(&mut self) {
        self.flow = Flow::Stop;
    }

    /// Fail the step unless `cond` holds
    ///
    /// # Errors
    ///
    /// Returns [`StepFault::Assertion`] if `cond` is false
    pub fn ensure(&self, cond: bool, message: impl Into<String>) -> Result<(), StepFault> {
        if cond {
            Ok(())
        } else {
            Err(StepFault::Assertion(message.into()))
        }
    }
}

/// A process written as a list of named steps
///
/// The program counter and the locals are the whole state:
/// `{ "locals": Map, "pc": Int }`.
pub struct StepProcess {
    label: String,
    steps: Vec<Step>,
    pc: usize,
    locals: Snapshot,
}

impl StepProcess {
    /// Create a process with no steps
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
            pc: 0,
            locals: Snapshot::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn step<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut StepContext<'_>) -> Result<(), StepFault> + 'static,
    {
        self.steps.push(Step {
            name: name.into(),
            run: Box::new(run),
        });
        self
    }

    /// Initialise a local
    ///
    /// A [`ChoiceSet`] here is a nondeterministic argument, resolved by the
    /// first commit.
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name, value);
        self
    }

    /// Label given at construction
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Program counter
    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Current locals
    #[must_use]
    pub fn locals(&self) -> &Snapshot {
        &self.locals
    }

    fn step_index(&self, name: &str) -> Result<usize, StepFault> {
        self.steps
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| StepFault::UnknownStep(name.to_string()))
    }

    fn field<'s>(&self, state: &'s Snapshot, field: &str) -> CoreResult<&'s Value> {
        state.get(field).ok_or_else(|| CoreError::FieldNotFound {
            owner: self.label.clone(),
            field: field.to_string(),
        })
    }
}

impl Process for StepProcess {
    fn name(&self) -> String {
        match self.steps.get(self.pc) {
            Some(step) => format!("{}@{}", self.label, step.name),
            None => format!("{}@done", self.label),
        }
    }

    fn get_state(&self) -> Snapshot {
        Snapshot::new()
            .with("locals", self.locals.clone())
            .with("pc", self.pc as i64)
    }

    fn set_state(&mut self, state: Snapshot) -> CoreResult<()> {
        let pc_path = format!("{}.pc", self.label);
        let pc = self.field(&state, "pc")?.expect_int(&pc_path)?;
        let pc = usize::try_from(pc).map_err(|_| CoreError::IndexOutOfBounds {
            path: pc_path,
            index: 0,
            len: self.steps.len(),
        })?;

        let locals = self.field(&state, "locals")?;
        let locals: BTreeMap<String, Value> = match locals {
            Value::Map(map) => map.clone(),
            other => {
                return Err(CoreError::TypeMismatch {
                    path: format!("{}.locals", self.label),
                    expected: "map",
                    actual: other.kind(),
                });
            }
        };

        self.pc = pc;
        self.locals = Snapshot::from(locals);
        Ok(())
    }

    fn can_execute(&self) -> bool {
        self.pc < self.steps.len()
    }

    fn execute(&mut self, models: &mut Models) -> Result<Continuation, StepFault> {
        let step = self.steps.get(self.pc).ok_or(StepFault::NotRunnable)?;

        let mut ctx = StepContext {
            models,
            locals: &mut self.locals,
            label: &self.label,
            flow: Flow::Next,
            pause: None,
        };
        (step.run)(&mut ctx)?;
        let StepContext { flow, pause, .. } = ctx;

        self.pc = match flow {
            Flow::Next => self.pc + 1,
            Flow::Goto(name) => self.step_index(&name)?,
            Flow::Stop => self.steps.len(),
        };

        if !self.can_execute() {
            return Ok(Continuation::Done);
        }
        Ok(match pause {
            Some((tag, fairness)) => Continuation::Yield { tag, fairness },
            None => Continuation::Normal,
        })
    }
}

impl fmt::Debug for StepProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepProcess")
            .field("label", &self.label)
            .field("steps", &self.steps.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("pc", &self.pc)
            .field("locals", &self.locals)
            .finish()
    }
}
