//! Resolution of nondeterministic choices into flat snapshots.
//!
//! At each level the deep entries (a choice, or a list/map still holding one)
//! are resolved recursively and every combination of their resolutions is
//! substituted back. Enumeration is deterministic: deep keys in key order
//! with the last one varying fastest, choice candidates in their stored order.
//! An empty choice has no resolutions, which prunes the whole branch.

use crate::cas::Cas;
use std::collections::{BTreeMap, HashSet};
use timewinder_core::{CanonicalEncode, CoreResult, Hash, Snapshot, Value};

/// Resolve every choice in `snapshot`, then hash and store each outcome
///
/// Returns the distinct hashes in first-seen order. The result is empty if
/// any reachable choice was empty.
///
/// # Errors
///
/// Returns error if an outcome cannot be encoded or the store rejects it
pub fn flatten_to_cas<C: Cas>(snapshot: &Snapshot, cas: &mut C) -> CoreResult<Vec<Hash>> {
    let outcomes = resolve_snapshot(snapshot);
    let mut seen = HashSet::with_capacity(outcomes.len());
    let mut hashes = Vec::with_capacity(outcomes.len());

    for flat in outcomes {
        let hash = flat.content_hash()?;
        cas.put(hash, flat)?;
        if seen.insert(hash) {
            hashes.push(hash);
        }
    }

    if hashes.len() != 1 {
        tracing::debug!(outcomes = hashes.len(), "commit fanned out");
    }
    Ok(hashes)
}

/// All flat resolutions of a snapshot
#[must_use]
pub fn resolve_snapshot(snapshot: &Snapshot) -> Vec<Snapshot> {
    resolve_map(snapshot.as_map())
        .into_iter()
        .map(Snapshot::from)
        .collect()
}

/// All flat resolutions of a value
#[must_use]
pub fn resolve_value(value: &Value) -> Vec<Value> {
    match value {
        Value::Choice(set) => set.iter().flat_map(resolve_value).collect(),
        Value::List(items) if value.is_deep() => {
            resolve_list(items).into_iter().map(Value::List).collect()
        }
        Value::Map(map) if value.is_deep() => {
            resolve_map(map).into_iter().map(Value::Map).collect()
        }
        _ => vec![value.clone()],
    }
}

fn resolve_map(map: &BTreeMap<String, Value>) -> Vec<BTreeMap<String, Value>> {
    let deep: Vec<&String> = map
        .iter()
        .filter(|(_, v)| v.is_deep())
        .map(|(k, _)| k)
        .collect();
    if deep.is_empty() {
        return vec![map.clone()];
    }

    let candidates: Vec<Vec<Value>> = deep.iter().map(|k| resolve_value(&map[*k])).collect();
    let mut out = Vec::new();
    for_each_combination(&candidates, |combo| {
        let mut resolved = map.clone();
        for (key, value) in deep.iter().zip(combo) {
            resolved.insert((*key).clone(), (*value).clone());
        }
        out.push(resolved);
    });
    out
}

fn resolve_list(items: &[Value]) -> Vec<Vec<Value>> {
    let deep: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_deep())
        .map(|(i, _)| i)
        .collect();
    if deep.is_empty() {
        return vec![items.to_vec()];
    }

    let candidates: Vec<Vec<Value>> = deep.iter().map(|&i| resolve_value(&items[i])).collect();
    let mut out = Vec::new();
    for_each_combination(&candidates, |combo| {
        let mut resolved = items.to_vec();
        for (&index, value) in deep.iter().zip(combo) {
            resolved[index] = (*value).clone();
        }
        out.push(resolved);
    });
    out
}

/// Visit the Cartesian product of `candidates`, last position fastest
fn for_each_combination<F>(candidates: &[Vec<Value>], mut visit: F)
where
    F: FnMut(&[&Value]),
{
    if candidates.iter().any(Vec::is_empty) {
        return;
    }

    let mut cursor = vec![0usize; candidates.len()];
    let mut combo: Vec<&Value> = candidates.iter().map(|c| &c[0]).collect();
    loop {
        visit(&combo);

        // Odometer increment from the right.
        let mut pos = candidates.len();
        loop {
            if pos == 0 {
                return;
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < candidates[pos].len() {
                combo[pos] = &candidates[pos][cursor[pos]];
                break;
            }
            cursor[pos] = 0;
            combo[pos] = &candidates[pos][0];
        }
    }
}
