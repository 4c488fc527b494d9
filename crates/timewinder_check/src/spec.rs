//! Named temporal specifications.

use crate::ltl::Ltl;
use crate::predicate::{FnPredicate, Predicate};
use std::fmt;
use std::sync::Arc;
use timewinder_core::CoreResult;
use timewinder_runtime::Models;

/// A specification the evaluator checks on every explored trace
#[derive(Debug, Clone)]
pub struct Spec {
    name: String,
    ltl: Ltl,
}

impl Spec {
    /// Check a formula, named by its rendering
    #[must_use]
    pub fn new(ltl: Ltl) -> Self {
        Self {
            name: ltl.to_string(),
            ltl,
        }
    }

    /// Check a formula under an explicit name
    #[must_use]
    pub fn named(name: impl Into<String>, ltl: Ltl) -> Self {
        Self {
            name: name.into(),
            ltl,
        }
    }

    /// Require a predicate in every state
    #[must_use]
    pub fn always<P: Predicate + 'static>(predicate: P) -> Self {
        let atom: Arc<dyn Predicate> = Arc::new(predicate);
        Self::new(Ltl::always(atom))
    }

    /// Require a closure to hold in every state
    #[must_use]
    pub fn always_fn<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Models) -> CoreResult<bool> + 'static,
    {
        Self::always(FnPredicate::new(name, check))
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The formula
    #[must_use]
    pub fn ltl(&self) -> &Ltl {
        &self.ltl
    }

    /// True if this is a liveness property
    #[must_use]
    pub fn is_liveness(&self) -> bool {
        self.ltl.is_liveness()
    }
}

impl From<Ltl> for Spec {
    fn from(ltl: Ltl) -> Self {
        Self::new(ltl)
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_wrapped_as_always() {
        let spec = Spec::always_fn("positive", |_| Ok(true));
        assert_eq!(spec.name(), "[](positive)");
        assert!(!spec.is_liveness());
        assert!(matches!(spec.ltl(), Ltl::Always(_)));
    }

    #[test]
    fn test_from_ltl() {
        let p: Arc<dyn Predicate> = Arc::new(FnPredicate::new("done", |_| Ok(true)));
        let spec: Spec = Ltl::eventually(p).into();
        assert_eq!(spec.to_string(), "<>(done)");
        assert!(spec.is_liveness());
    }

    #[test]
    fn test_named() {
        let p: Arc<dyn Predicate> = Arc::new(FnPredicate::new("p", |_| Ok(true)));
        assert_eq!(Spec::named("custom", Ltl::always(p)).name(), "custom");
    }
}
