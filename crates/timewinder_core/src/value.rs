//! State values and snapshots.
//!
//! A [`Snapshot`] is the sorted field map an entity reduces its state to.
//! Before it is committed a snapshot may hold [`Value::Choice`] leaves at
//! any depth; committing resolves every choice into one flat snapshot per
//! combination.

use crate::error::{CoreError, CoreResult};
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single state value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Reference to another stored snapshot
    Hash(Hash),
    /// Ordered list
    List(Vec<Value>),
    /// Sorted map
    Map(BTreeMap<String, Value>),
    /// Nondeterministic choice, resolved at commit time
    Choice(ChoiceSet),
}

impl Value {
    /// Name of this value's kind, used in error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Hash(_) => "hash",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Choice(_) => "choice",
        }
    }

    /// True if no choice remains anywhere inside this value
    #[must_use]
    pub fn is_flat(&self) -> bool {
        match self {
            Self::Choice(_) => false,
            Self::List(items) => items.iter().all(Value::is_flat),
            Self::Map(map) => map.values().all(Value::is_flat),
            _ => true,
        }
    }

    /// True if this value needs resolving before it can be hashed
    ///
    /// A choice is always deep; lists and maps are deep only while they
    /// still contain a choice.
    #[must_use]
    pub fn is_deep(&self) -> bool {
        !self.is_flat()
    }

    /// Get as bool
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as list
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as mutable list
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as map
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Integer value or a type error naming `path`
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the value is not an integer
    pub fn expect_int(&self, path: &str) -> CoreResult<i64> {
        self.as_int().ok_or_else(|| self.mismatch(path, "int"))
    }

    /// Boolean value or a type error naming `path`
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the value is not a bool
    pub fn expect_bool(&self, path: &str) -> CoreResult<bool> {
        self.as_bool().ok_or_else(|| self.mismatch(path, "bool"))
    }

    /// Path of the first choice found inside this value, if any
    #[must_use]
    pub fn first_choice(&self, path: &str) -> Option<String> {
        match self {
            Self::Choice(_) => Some(path.to_string()),
            Self::List(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| v.first_choice(&format!("{}[{}]", path, i))),
            Self::Map(map) => map
                .iter()
                .find_map(|(k, v)| v.first_choice(&format!("{}.{}", path, k))),
            _ => None,
        }
    }

    fn mismatch(&self, path: &str, expected: &'static str) -> CoreError {
        CoreError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual: self.kind(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Bytes(b) => write!(f, "b'{}'", hex::encode(b)),
            Self::Hash(h) => write!(f, "#{}", h.short()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Self::Map(map) => write_map(f, map),
            Self::Choice(set) => write!(f, "{}", set),
        }
    }
}

fn write_map(f: &mut fmt::Formatter<'_>, map: &BTreeMap<String, Value>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", k, v)?;
    }
    write!(f, "}}")
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Hash> for Value {
    fn from(h: Hash) -> Self {
        Self::Hash(h)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<ChoiceSet> for Value {
    fn from(set: ChoiceSet) -> Self {
        Self::Choice(set)
    }
}

impl From<Snapshot> for Value {
    fn from(snapshot: Snapshot) -> Self {
        Self::Map(snapshot.0)
    }
}

/// An enumerable set of candidate values for one nondeterministic choice
///
/// Order is preserved: resolutions are produced in the order the candidates
/// were given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceSet(Vec<Value>);

impl ChoiceSet {
    /// Create from candidate values
    #[must_use]
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Integers in `from..to`
    #[must_use]
    pub fn range(from: i64, to: i64) -> Self {
        Self::new(from..to)
    }

    /// Integers in `from..=to`
    #[must_use]
    pub fn in_range(from: i64, to: i64) -> Self {
        Self::new(from..=to)
    }

    /// Both booleans
    #[must_use]
    pub fn either() -> Self {
        Self::new([true, false])
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there is nothing to choose from
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over candidates
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Candidates as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl FromIterator<Value> for ChoiceSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ChoiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Choice{{")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "}}")
    }
}

/// A sorted map of named state values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    /// Create an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Get a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a mutable value
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Check if a key is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Borrow the underlying map
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    /// Take the underlying map
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// True if no choice remains anywhere in the snapshot
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.0.values().all(Value::is_flat)
    }

    /// Keys at this level whose values still need resolving, in key order
    #[must_use]
    pub fn deep_keys(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, v)| v.is_deep())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Path of the first choice in the snapshot, if any
    #[must_use]
    pub fn first_choice(&self) -> Option<String> {
        self.0.iter().find_map(|(k, v)| v.first_choice(k))
    }
}

impl From<BTreeMap<String, Value>> for Snapshot {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_map(f, &self.0)
    }
}
