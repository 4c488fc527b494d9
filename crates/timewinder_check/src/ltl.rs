//! Temporal formulas over predicates.
//!
//! An [`Ltl`] tree is what users write. Before a run it is compiled into a
//! [`Formula`] whose leaves are column indices into the per-thunk predicate
//! traces, so each predicate is evaluated once per state no matter how many
//! formulas mention it.

use crate::predicate::Predicate;
use crate::trace;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// A temporal logic expression
#[derive(Clone)]
pub enum Ltl {
    /// A predicate evaluated at each state
    Atom(Arc<dyn Predicate>),
    /// Holds in every state from here on
    Always(Box<Ltl>),
    /// Holds in some state from here on
    Eventually(Box<Ltl>),
    /// Negation
    Not(Box<Ltl>),
    /// Whenever the left side holds, the right side eventually holds
    LeadsTo(Box<Ltl>, Box<Ltl>),
}

impl Ltl {
    /// Wrap a predicate
    #[must_use]
    pub fn atom<P: Predicate + 'static>(predicate: P) -> Self {
        Self::Atom(Arc::new(predicate))
    }

    /// `[](inner)`
    #[must_use]
    pub fn always(inner: impl Into<Ltl>) -> Self {
        Self::Always(Box::new(inner.into()))
    }

    /// `<>(inner)`
    #[must_use]
    pub fn eventually(inner: impl Into<Ltl>) -> Self {
        Self::Eventually(Box::new(inner.into()))
    }

    /// `!(inner)`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: impl Into<Ltl>) -> Self {
        Self::Not(Box::new(inner.into()))
    }

    /// `(p) ~> (q)`
    #[must_use]
    pub fn leads_to(p: impl Into<Ltl>, q: impl Into<Ltl>) -> Self {
        Self::LeadsTo(Box::new(p.into()), Box::new(q.into()))
    }

    /// True if the formula can only be refuted by a complete trace
    #[must_use]
    pub fn is_liveness(&self) -> bool {
        match self {
            Self::Atom(_) => false,
            Self::Eventually(_) | Self::LeadsTo(..) => true,
            Self::Always(inner) | Self::Not(inner) => inner.is_liveness(),
        }
    }

    /// Every predicate leaf, left to right
    #[must_use]
    pub fn predicates(&self) -> Vec<Arc<dyn Predicate>> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<Arc<dyn Predicate>>) {
        match self {
            Self::Atom(p) => out.push(Arc::clone(p)),
            Self::Always(inner) | Self::Eventually(inner) | Self::Not(inner) => {
                inner.collect(out);
            }
            Self::LeadsTo(p, q) => {
                p.collect(out);
                q.collect(out);
            }
        }
    }

    /// Resolve leaves to columns, registering unseen predicates
    ///
    /// A predicate already in `columns` (by identity) reuses its column.
    pub fn compile(&self, columns: &mut Vec<Arc<dyn Predicate>>) -> Formula {
        match self {
            Self::Atom(p) => {
                let index = match columns.iter().position(|c| Arc::ptr_eq(c, p)) {
                    Some(index) => index,
                    None => {
                        columns.push(Arc::clone(p));
                        columns.len() - 1
                    }
                };
                Formula::Column(index)
            }
            Self::Always(inner) => Formula::Always(Box::new(inner.compile(columns))),
            Self::Eventually(inner) => Formula::Eventually(Box::new(inner.compile(columns))),
            Self::Not(inner) => Formula::Not(Box::new(inner.compile(columns))),
            Self::LeadsTo(p, q) => {
                let p = p.compile(columns);
                let q = q.compile(columns);
                Formula::LeadsTo(Box::new(p), Box::new(q))
            }
        }
    }
}

impl From<Arc<dyn Predicate>> for Ltl {
    fn from(predicate: Arc<dyn Predicate>) -> Self {
        Self::Atom(predicate)
    }
}

impl fmt::Display for Ltl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(p) => write!(f, "{}", p.name()),
            Self::Always(inner) => write!(f, "[]({})", inner),
            Self::Eventually(inner) => write!(f, "<>({})", inner),
            Self::Not(inner) => write!(f, "!({})", inner),
            Self::LeadsTo(p, q) => write!(f, "({}) ~> ({})", p, q),
        }
    }
}

impl fmt::Debug for Ltl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ltl({})", self)
    }
}

/// A compiled formula over predicate columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    /// Trace of one predicate
    Column(usize),
    /// See [`Ltl::Always`]
    Always(Box<Formula>),
    /// See [`Ltl::Eventually`]
    Eventually(Box<Formula>),
    /// See [`Ltl::Not`]
    Not(Box<Formula>),
    /// See [`Ltl::LeadsTo`]
    LeadsTo(Box<Formula>, Box<Formula>),
}

impl Formula {
    /// Evaluate over full predicate traces
    ///
    /// Element `i` of the result is the formula's value on the suffix that
    /// starts at state `i`; a decision is element 0.
    ///
    /// # Panics
    ///
    /// Panics if a column index is out of range
    #[must_use]
    pub fn eval(&self, columns: &[Vec<bool>]) -> Vec<bool> {
        match self {
            Self::Column(i) => columns[*i].clone(),
            Self::Always(inner) => trace::always(&inner.eval(columns)),
            Self::Eventually(inner) => trace::eventually(&inner.eval(columns)),
            Self::Not(inner) => trace::not(&inner.eval(columns)),
            Self::LeadsTo(p, q) => trace::leads_to(&p.eval(columns), &q.eval(columns)),
        }
    }

    /// Value at the first state, true for an empty trace
    #[must_use]
    pub fn holds(&self, columns: &[Vec<bool>]) -> bool {
        self.eval(columns).first().copied().unwrap_or(true)
    }

    /// Like [`Formula::eval`] for a path whose last state steps back to
    /// state `loop_start`
    ///
    /// # Panics
    ///
    /// Panics if a column index is out of range
    #[must_use]
    pub fn eval_lasso(&self, columns: &[Vec<bool>], loop_start: usize) -> Vec<bool> {
        match self {
            Self::Column(i) => columns[*i].clone(),
            Self::Always(inner) => {
                trace::always_lasso(&inner.eval_lasso(columns, loop_start), loop_start)
            }
            Self::Eventually(inner) => {
                trace::eventually_lasso(&inner.eval_lasso(columns, loop_start), loop_start)
            }
            Self::Not(inner) => trace::not(&inner.eval_lasso(columns, loop_start)),
            Self::LeadsTo(p, q) => trace::leads_to_lasso(
                &p.eval_lasso(columns, loop_start),
                &q.eval_lasso(columns, loop_start),
                loop_start,
            ),
        }
    }

    /// Value at the first state of a looping path, true for an empty trace
    #[must_use]
    pub fn holds_lasso(&self, columns: &[Vec<bool>], loop_start: usize) -> bool {
        self.eval_lasso(columns, loop_start).first().copied().unwrap_or(true)
    }

    /// JSON rendering keyed by operator, with column indices as leaves
    #[must_use]
    pub fn to_tree(&self) -> serde_json::Value {
        match self {
            Self::Column(i) => json!(i),
            Self::Always(inner) => json!({ "always": inner.to_tree() }),
            Self::Eventually(inner) => json!({ "eventually": inner.to_tree() }),
            Self::Not(inner) => json!({ "inverse": inner.to_tree() }),
            Self::LeadsTo(p, q) => json!({ "leads_to": [p.to_tree(), q.to_tree()] }),
        }
    }
}
