//! Finite-trace semantics of the temporal operators.
//!
//! A trace holds one boolean per state along an execution path. Every
//! operator maps a trace to a trace of the same length whose element `i` is
//! the value of the formula on the suffix starting at `i`.

/// `always(t)[i]` holds if every element from `i` on holds
#[must_use]
pub fn always(trace: &[bool]) -> Vec<bool> {
    let mut out = vec![false; trace.len()];
    let mut acc = true;
    for (i, &b) in trace.iter().enumerate().rev() {
        acc &= b;
        out[i] = acc;
    }
    out
}

/// `eventually(t)[i]` holds if any element from `i` on holds
#[must_use]
pub fn eventually(trace: &[bool]) -> Vec<bool> {
    let mut out = vec![false; trace.len()];
    let mut acc = false;
    for (i, &b) in trace.iter().enumerate().rev() {
        acc |= b;
        out[i] = acc;
    }
    out
}

/// Element-wise negation
#[must_use]
pub fn not(trace: &[bool]) -> Vec<bool> {
    trace.iter().map(|b| !b).collect()
}

/// Element-wise implication
///
/// # Panics
///
/// Panics if the traces differ in length
#[must_use]
pub fn implies(p: &[bool], q: &[bool]) -> Vec<bool> {
    assert_eq!(p.len(), q.len(), "implies over traces of different length");
    p.iter().zip(q).map(|(&p, &q)| !p || q).collect()
}

/// `p` is always eventually followed by `q`
#[must_use]
pub fn leads_to(p: &[bool], q: &[bool]) -> Vec<bool> {
    always(&implies(p, &eventually(q)))
}

/// [`always`] on a path whose last state steps back to `loop_start`
///
/// Every suffix that starts inside the loop repeats it forever, so it holds
/// only if the whole loop holds.
#[must_use]
pub fn always_lasso(trace: &[bool], loop_start: usize) -> Vec<bool> {
    fold_lasso(trace, loop_start, true, |acc, b| acc && b)
}

/// [`eventually`] on a path whose last state steps back to `loop_start`
#[must_use]
pub fn eventually_lasso(trace: &[bool], loop_start: usize) -> Vec<bool> {
    fold_lasso(trace, loop_start, false, |acc, b| acc || b)
}

/// [`leads_to`] on a path whose last state steps back to `loop_start`
#[must_use]
pub fn leads_to_lasso(p: &[bool], q: &[bool], loop_start: usize) -> Vec<bool> {
    always_lasso(&implies(p, &eventually_lasso(q, loop_start)), loop_start)
}

fn fold_lasso(
    trace: &[bool],
    loop_start: usize,
    init: bool,
    op: fn(bool, bool) -> bool,
) -> Vec<bool> {
    let start = loop_start.min(trace.len());
    let cycle = trace[start..].iter().fold(init, |acc, &b| op(acc, b));
    let mut out = vec![cycle; trace.len()];
    let mut acc = cycle;
    for i in (0..start).rev() {
        acc = op(acc, trace[i]);
        out[i] = acc;
    }
    out
}
