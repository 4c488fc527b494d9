//! Field-level differences between two snapshots.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use timewinder_core::{Snapshot, Value};

/// One changed leaf, addressed by a dotted path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Dotted path from the mount name down
    pub path: String,
    /// Value before (`None` if added)
    pub old: Option<Value>,
    /// Value after (`None` if removed)
    pub new: Option<Value>,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (Some(old), Some(new)) => write!(f, "{}: {} -> {}", self.path, old, new),
            (None, Some(new)) => write!(f, "{}: + {}", self.path, new),
            (Some(old), None) => write!(f, "{}: - {}", self.path, old),
            (None, None) => write!(f, "{}", self.path),
        }
    }
}

/// Every changed leaf between two states, in path order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotDiff {
    /// Changed leaves
    pub changes: Vec<FieldChange>,
}

impl SnapshotDiff {
    /// Compute diff between two snapshots
    ///
    /// Maps are compared key by key; any other value that differs is
    /// reported whole.
    #[must_use]
    pub fn compute(before: &Snapshot, after: &Snapshot) -> Self {
        let mut diff = Self::default();
        diff_maps("", before.as_map(), after.as_map(), &mut diff.changes);
        diff
    }

    /// Check if there are any differences
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Number of changed leaves
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True if nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Change at a path, if any
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.path == path)
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn diff_maps(
    prefix: &str,
    before: &BTreeMap<String, Value>,
    after: &BTreeMap<String, Value>,
    out: &mut Vec<FieldChange>,
) {
    let mut keys: Vec<&String> = before.keys().chain(after.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let path = join(prefix, key);
        match (before.get(key), after.get(key)) {
            (Some(Value::Map(b)), Some(Value::Map(a))) => diff_maps(&path, b, a, out),
            (b, a) if b != a => out.push(FieldChange {
                path,
                old: b.cloned(),
                new: a.cloned(),
            }),
            _ => {}
        }
    }
}

impl fmt::Display for SnapshotDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            writeln!(f, "  {}", change)?;
        }
        Ok(())
    }
}
