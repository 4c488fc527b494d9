//! Passive stateful entities.

use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use timewinder_core::{CoreError, CoreResult, Snapshot, Value};

/// A mounted entity whose whole state round-trips through a [`Snapshot`]
///
/// `set_state` is a full replace: after it returns, `get_state` must yield
/// exactly the snapshot that was set.
pub trait Model: Any {
    /// Mount name, unique within a controller
    fn name(&self) -> &str;

    /// Current state
    fn get_state(&self) -> Snapshot;

    /// Replace the current state
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot does not describe this model
    fn set_state(&mut self, state: Snapshot) -> CoreResult<()>;

    /// Upcast for typed access
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A named object whose fields are its state
///
/// The `kind` groups objects of the same shape, so a predicate can range
/// over every account without naming each one.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectModel {
    name: String,
    kind: String,
    fields: Snapshot,
}

impl ObjectModel {
    /// Create an object with no fields
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            fields: Snapshot::new(),
        }
    }

    /// Builder-style field initialisation
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field, value);
        self
    }

    /// Object kind
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All fields
    #[must_use]
    pub fn fields(&self) -> &Snapshot {
        &self.fields
    }

    /// Get a field
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldNotFound`] if the field is missing
    pub fn get(&self, field: &str) -> CoreResult<&Value> {
        self.fields.get(field).ok_or_else(|| self.missing(field))
    }

    /// Get a mutable field
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldNotFound`] if the field is missing
    pub fn get_mut(&mut self, field: &str) -> CoreResult<&mut Value> {
        match self.fields.get_mut(field) {
            Some(value) => Ok(value),
            None => Err(CoreError::FieldNotFound {
                owner: self.name.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Set a field, creating it if needed
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field, value);
    }

    /// Integer field
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not an integer
    pub fn int(&self, field: &str) -> CoreResult<i64> {
        self.get(field)?.expect_int(&self.path(field))
    }

    /// Boolean field
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not a bool
    pub fn bool(&self, field: &str) -> CoreResult<bool> {
        self.get(field)?.expect_bool(&self.path(field))
    }

    /// List field
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not a list
    pub fn list(&self, field: &str) -> CoreResult<&[Value]> {
        let value = self.get(field)?;
        value.as_list().ok_or_else(|| CoreError::TypeMismatch {
            path: self.path(field),
            expected: "list",
            actual: value.kind(),
        })
    }

    /// Mutable list field
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not a list
    pub fn list_mut(&mut self, field: &str) -> CoreResult<&mut Vec<Value>> {
        let path = self.path(field);
        let value = self.get_mut(field)?;
        let actual = value.kind();
        value.as_list_mut().ok_or(CoreError::TypeMismatch {
            path,
            expected: "list",
            actual,
        })
    }

    /// Append to a list field
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not a list
    pub fn push(&mut self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.list_mut(field)?.push(value.into());
        Ok(())
    }

    /// Remove and return the first element of a list field
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexOutOfBounds`] if the list is empty
    pub fn pop_front(&mut self, field: &str) -> CoreResult<Value> {
        let path = self.path(field);
        let list = self.list_mut(field)?;
        if list.is_empty() {
            return Err(CoreError::IndexOutOfBounds {
                path,
                index: 0,
                len: 0,
            });
        }
        Ok(list.remove(0))
    }

    fn path(&self, field: &str) -> String {
        format!("{}.{}", self.name, field)
    }

    fn missing(&self, field: &str) -> CoreError {
        CoreError::FieldNotFound {
            owner: self.name.clone(),
            field: field.to_string(),
        }
    }
}

impl Model for ObjectModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_state(&self) -> Snapshot {
        self.fields.clone()
    }

    fn set_state(&mut self, state: Snapshot) -> CoreResult<()> {
        self.fields = state;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Display for ObjectModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.fields)
    }
}

/// The mounted models, as seen by process steps and predicates
#[derive(Default)]
pub struct Models {
    models: IndexMap<String, Box<dyn Model>>,
}

impl Models {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            models: IndexMap::new(),
        }
    }

    /// Add a model under a name
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateMount`] if the name is taken
    pub fn insert(&mut self, name: impl Into<String>, model: Box<dyn Model>) -> CoreResult<()> {
        let name = name.into();
        if self.models.contains_key(&name) {
            return Err(CoreError::DuplicateMount { name });
        }
        self.models.insert(name, model);
        Ok(())
    }

    /// Check if a model is mounted
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Number of models
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True if nothing is mounted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Get a model
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownMount`] if no model has this name
    pub fn get(&self, name: &str) -> CoreResult<&dyn Model> {
        self.models
            .get(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| CoreError::UnknownMount {
                name: name.to_string(),
            })
    }

    /// Get a mutable model
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownMount`] if no model has this name
    pub fn get_mut(&mut self, name: &str) -> CoreResult<&mut dyn Model> {
        match self.models.get_mut(name) {
            Some(m) => Ok(m.as_mut()),
            None => Err(CoreError::UnknownMount {
                name: name.to_string(),
            }),
        }
    }

    /// Get a model as its concrete type
    ///
    /// # Errors
    ///
    /// Returns error if the model is missing or of another type
    pub fn downcast<T: Model>(&self, name: &str) -> CoreResult<&T> {
        self.get(name)?
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| CoreError::WrongModelType {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Get a model mutably as its concrete type
    ///
    /// # Errors
    ///
    /// Returns error if the model is missing or of another type
    pub fn downcast_mut<T: Model>(&mut self, name: &str) -> CoreResult<&mut T> {
        self.get_mut(name)?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| CoreError::WrongModelType {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Get an [`ObjectModel`]
    ///
    /// # Errors
    ///
    /// Returns error if the model is missing or not an object
    pub fn object(&self, name: &str) -> CoreResult<&ObjectModel> {
        self.downcast::<ObjectModel>(name)
    }

    /// Get a mutable [`ObjectModel`]
    ///
    /// # Errors
    ///
    /// Returns error if the model is missing or not an object
    pub fn object_mut(&mut self, name: &str) -> CoreResult<&mut ObjectModel> {
        self.downcast_mut::<ObjectModel>(name)
    }

    /// Every mounted [`ObjectModel`], in mount order
    pub fn objects(&self) -> impl Iterator<Item = &ObjectModel> {
        self.models
            .values()
            .filter_map(|m| m.as_any().downcast_ref::<ObjectModel>())
    }

    /// Iterate over `(name, model)` in mount order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Model)> {
        self.models.iter().map(|(k, m)| (k.as_str(), m.as_ref()))
    }

    /// Iterate mutably over `(name, model)` in mount order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Box<dyn Model>)> {
        self.models.iter_mut().map(|(k, m)| (k.as_str(), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str, balance: i64) -> ObjectModel {
        ObjectModel::new(name, "Account")
            .with_field("name", name)
            .with_field("acc", balance)
    }

    #[test]
    fn test_object_fields() {
        let mut alice = account("alice", 5);
        assert_eq!(alice.int("acc").unwrap(), 5);
        alice.set("acc", 2);
        assert_eq!(alice.int("acc").unwrap(), 2);
        assert_eq!(alice.kind(), "Account");
    }

    #[test]
    fn test_object_missing_field() {
        let alice = account("alice", 5);
        assert_eq!(
            alice.int("balance"),
            Err(CoreError::FieldNotFound {
                owner: "alice".to_string(),
                field: "balance".to_string(),
            })
        );
    }

    #[test]
    fn test_object_list_ops() {
        let mut q = ObjectModel::new("q", "Queue").with_field("queue", Value::List(vec![]));
        q.push("queue", "msg").unwrap();
        q.push("queue", "msg2").unwrap();
        assert_eq!(q.list("queue").unwrap().len(), 2);
        assert_eq!(q.pop_front("queue").unwrap(), Value::from("msg"));
        q.pop_front("queue").unwrap();
        assert!(matches!(
            q.pop_front("queue"),
            Err(CoreError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_object_state_roundtrip() {
        let mut alice = account("alice", 5);
        let saved = alice.get_state();
        alice.set("acc", -1);
        alice.set_state(saved.clone()).unwrap();
        assert_eq!(alice.get_state(), saved);
    }

    #[test]
    fn test_models_lookup() {
        let mut models = Models::new();
        models.insert("alice", Box::new(account("alice", 5))).unwrap();
        models.insert("bob", Box::new(account("bob", 5))).unwrap();

        assert_eq!(models.len(), 2);
        assert_eq!(models.object("bob").unwrap().int("acc").unwrap(), 5);
        models.object_mut("bob").unwrap().set("acc", 9);
        assert_eq!(models.object("bob").unwrap().int("acc").unwrap(), 9);
        assert!(matches!(
            models.object("carol"),
            Err(CoreError::UnknownMount { .. })
        ));
        assert_eq!(models.objects().count(), 2);
    }

    #[test]
    fn test_models_duplicate() {
        let mut models = Models::new();
        models.insert("alice", Box::new(account("alice", 5))).unwrap();
        let result = models.insert("alice", Box::new(account("alice", 1)));
        assert!(matches!(result, Err(CoreError::DuplicateMount { .. })));
    }

    struct Counter {
        n: i64,
    }

    impl Model for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn get_state(&self) -> Snapshot {
            Snapshot::new().with("n", self.n)
        }

        fn set_state(&mut self, state: Snapshot) -> CoreResult<()> {
            self.n = state
                .get("n")
                .ok_or_else(|| CoreError::FieldNotFound {
                    owner: "counter".to_string(),
                    field: "n".to_string(),
                })?
                .expect_int("counter.n")?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_models_downcast() {
        let mut models = Models::new();
        models.insert("counter", Box::new(Counter { n: 1 })).unwrap();
        models.downcast_mut::<Counter>("counter").unwrap().n += 1;
        assert_eq!(models.downcast::<Counter>("counter").unwrap().n, 2);
        assert!(matches!(
            models.object("counter"),
            Err(CoreError::WrongModelType { .. })
        ));
    }
}
