//! Boolean checks over the mounted models.

use std::fmt;
use timewinder_core::CoreResult;
use timewinder_runtime::{Models, ObjectModel};

/// A named, side-effect free check of the current state
///
/// Errors are usage errors (a field that does not exist, a value of the
/// wrong type) and abort the run.
pub trait Predicate {
    /// Display name
    fn name(&self) -> &str;

    /// Evaluate against the currently restored models
    ///
    /// # Errors
    ///
    /// Returns error if the models do not have the expected shape
    fn check(&self, models: &Models) -> CoreResult<bool>;
}

type CheckFn = Box<dyn Fn(&Models) -> CoreResult<bool>>;

/// A predicate backed by a closure
pub struct FnPredicate {
    name: String,
    check: CheckFn,
}

impl FnPredicate {
    /// Create a predicate
    #[must_use]
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Models) -> CoreResult<bool> + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }
}

impl Predicate for FnPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, models: &Models) -> CoreResult<bool> {
        (self.check)(models)
    }
}

impl fmt::Debug for FnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate").field("name", &self.name).finish()
    }
}

type ObjectCheckFn = Box<dyn Fn(&ObjectModel) -> CoreResult<bool>>;

/// Holds when every mounted [`ObjectModel`] satisfies a check
///
/// Restricted to one object kind if one is given; models of other types
/// are skipped.
pub struct ForAll {
    name: String,
    kind: Option<String>,
    check: ObjectCheckFn,
}

impl ForAll {
    /// Range over every object
    #[must_use]
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ObjectModel) -> CoreResult<bool> + 'static,
    {
        Self {
            name: name.into(),
            kind: None,
            check: Box::new(check),
        }
    }

    /// Range over objects of one kind only
    #[must_use]
    pub fn of_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

impl Predicate for ForAll {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, models: &Models) -> CoreResult<bool> {
        for object in models.objects() {
            if self.kind.as_deref().is_some_and(|k| object.kind() != k) {
                continue;
            }
            if !(self.check)(object)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for ForAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForAll")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
