//! State controller.
//!
//! Owns every mounted model and process. A commit reduces all of them to one
//! composite snapshot keyed by mount name and stores each of its flat
//! resolutions; a restore pushes a stored snapshot back into the mounts.

use crate::model::{Model, Models};
use crate::process::{Continuation, Process, StepFault, ThreadId};
use std::fmt::Write as _;
use std::sync::Arc;
use timewinder_core::{CoreError, CoreResult, Hash, Snapshot, Value};
use timewinder_storage::{flatten_to_cas, Cas, CasConfig, MemoryCas};

struct MountedProcess {
    name: String,
    process: Box<dyn Process>,
}

/// Mount table, content store and the commit/restore cycle between them
pub struct StateController {
    cas: MemoryCas,
    models: Models,
    processes: Vec<MountedProcess>,
}

impl Default for StateController {
    fn default() -> Self {
        Self::new()
    }
}

impl StateController {
    /// Create a controller with an unbounded store
    #[must_use]
    pub fn new() -> Self {
        Self::with_cas(CasConfig::default())
    }

    /// Create with custom store configuration
    #[must_use]
    pub fn with_cas(config: CasConfig) -> Self {
        Self {
            cas: MemoryCas::with_config(config),
            models: Models::new(),
            processes: Vec::new(),
        }
    }

    /// Replace the content store limits
    pub fn set_cas_config(&mut self, config: CasConfig) {
        self.cas.set_config(config);
    }

    /// Mount a model under its own name
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateMount`] if the name is taken
    pub fn mount<M: Model>(&mut self, model: M) -> CoreResult<()> {
        let name = model.name().to_string();
        self.mount_as(name, model)
    }

    /// Mount a model under an explicit name
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateMount`] if the name is taken
    pub fn mount_as<M: Model>(&mut self, name: impl Into<String>, model: M) -> CoreResult<()> {
        let name = name.into();
        self.ensure_free(&name)?;
        self.models.insert(name, Box::new(model))
    }

    /// Mount a process; its thread id is its position in mount order
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateMount`] if the name is taken
    pub fn mount_process<P: Process + 'static>(
        &mut self,
        name: impl Into<String>,
        process: P,
    ) -> CoreResult<ThreadId> {
        let name = name.into();
        self.ensure_free(&name)?;
        let tid = ThreadId(self.processes.len());
        tracing::debug!(mount = %name, thread = %tid, "mounted process");
        self.processes.push(MountedProcess {
            name,
            process: Box::new(process),
        });
        Ok(tid)
    }

    fn ensure_free(&self, name: &str) -> CoreResult<()> {
        if self.models.contains(name) || self.processes.iter().any(|p| p.name == name) {
            return Err(CoreError::DuplicateMount {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// The combined state of every mount, possibly holding choices
    #[must_use]
    pub fn composite(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (name, model) in self.models.iter() {
            snapshot.insert(name, model.get_state());
        }
        for mounted in &self.processes {
            snapshot.insert(mounted.name.clone(), mounted.process.get_state());
        }
        snapshot
    }

    /// Store every resolution of the current state
    ///
    /// Returns the distinct hashes in enumeration order; empty if a choice
    /// had no candidates.
    ///
    /// # Errors
    ///
    /// Returns error if a resolution cannot be encoded or stored
    pub fn commit(&mut self) -> CoreResult<Vec<Hash>> {
        let composite = self.composite();
        flatten_to_cas(&composite, &mut self.cas)
    }

    /// Load a stored state into every mount
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownHash`] if the hash is not stored,
    /// [`CoreError::UnknownMount`] if the snapshot names an entity that is
    /// not mounted and [`CoreError::MissingMount`] if a mount has no entry.
    pub fn restore(&mut self, hash: &Hash) -> CoreResult<()> {
        let stored = self.cas.get(hash)?;

        for key in stored.keys() {
            if !self.is_mounted(key) {
                return Err(CoreError::UnknownMount {
                    name: key.to_string(),
                });
            }
        }

        for (name, model) in self.models.iter_mut() {
            let state = Self::sub_state(&stored, name, hash)?;
            model.set_state(state)?;
        }
        for mounted in &mut self.processes {
            let state = Self::sub_state(&stored, &mounted.name, hash)?;
            mounted.process.set_state(state)?;
        }
        Ok(())
    }

    fn is_mounted(&self, name: &str) -> bool {
        self.models.contains(name) || self.processes.iter().any(|p| p.name == name)
    }

    fn sub_state(stored: &Snapshot, name: &str, hash: &Hash) -> CoreResult<Snapshot> {
        match stored.get(name) {
            Some(Value::Map(map)) => Ok(Snapshot::from(map.clone())),
            Some(other) => Err(CoreError::TypeMismatch {
                path: name.to_string(),
                expected: "map",
                actual: other.kind(),
            }),
            None => Err(CoreError::MissingMount {
                name: name.to_string(),
                hash: hash.to_hex(),
            }),
        }
    }

    /// Run one step of a process against the mounted models
    ///
    /// # Errors
    ///
    /// Returns [`StepFault`] if the step fails or the id is unknown
    pub fn execute(&mut self, tid: ThreadId) -> Result<Continuation, StepFault> {
        let mounted = self
            .processes
            .get_mut(tid.0)
            .ok_or_else(|| CoreError::UnknownMount {
                name: format!("thread {}", tid),
            })?;
        mounted.process.execute(&mut self.models)
    }

    /// Thread ids of every process that can take a step, in mount order
    #[must_use]
    pub fn runnable(&self) -> Vec<ThreadId> {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.process.can_execute())
            .map(|(i, _)| ThreadId(i))
            .collect()
    }

    /// Get a mounted process
    #[must_use]
    pub fn process(&self, tid: ThreadId) -> Option<&dyn Process> {
        self.processes.get(tid.0).map(|p| p.process.as_ref())
    }

    /// Mount name of a process
    #[must_use]
    pub fn process_mount(&self, tid: ThreadId) -> Option<&str> {
        self.processes.get(tid.0).map(|p| p.name.as_str())
    }

    /// Diagnostic name of a process, reflecting its current step
    #[must_use]
    pub fn process_name(&self, tid: ThreadId) -> Option<String> {
        self.process(tid).map(|p| p.name())
    }

    /// Number of mounted processes
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Mounted models
    #[must_use]
    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Mutable mounted models
    pub fn models_mut(&mut self) -> &mut Models {
        &mut self.models
    }

    /// Content store
    #[must_use]
    pub fn cas(&self) -> &MemoryCas {
        &self.cas
    }

    /// Stored snapshot for a hash
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownHash`] if nothing is stored under `hash`
    pub fn snapshot(&self, hash: &Hash) -> CoreResult<Arc<Snapshot>> {
        self.cas.get(hash)
    }

    /// Forget every stored state except `keep`
    pub fn retain_snapshots(&mut self, keep: &[Hash]) {
        self.cas.retain(keep);
    }

    /// Dump of every mount, one `name:` header per entity
    #[must_use]
    pub fn state_to_string(&self) -> String {
        let mut out = String::new();
        for (name, model) in self.models.iter() {
            let _ = writeln!(out, "{}:\n\t{}", name, model.get_state());
        }
        for mounted in &self.processes {
            let _ = writeln!(
                out,
                "{} ({}):\n\t{}",
                mounted.name,
                mounted.process.name(),
                mounted.process.get_state()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectModel;
    use crate::process::StepProcess;
    use timewinder_core::{CanonicalEncode, ChoiceSet};

    fn account(name: &str, balance: i64) -> ObjectModel {
        ObjectModel::new(name, "Account").with_field("acc", balance)
    }

    fn withdraw(amount: i64) -> StepProcess {
        StepProcess::new("withdraw").step("withdraw", move |ctx| {
            let alice = ctx.object_mut("alice")?;
            let acc = alice.int("acc")?;
            alice.set("acc", acc - amount);
            Ok(())
        })
    }

    #[test]
    fn test_commit_restore_roundtrip() {
        let mut sc = StateController::new();
        sc.mount(account("alice", 5)).unwrap();
        let tid = sc.mount_process("w", withdraw(2)).unwrap();
        assert_eq!(tid, ThreadId(0));

        let h0 = sc.commit().unwrap();
        assert_eq!(h0.len(), 1);

        sc.execute(tid).unwrap();
        assert_eq!(sc.models().object("alice").unwrap().int("acc").unwrap(), 3);
        assert!(sc.runnable().is_empty());
        let h1 = sc.commit().unwrap();
        assert_ne!(h0, h1);

        sc.restore(&h0[0]).unwrap();
        assert_eq!(sc.models().object("alice").unwrap().int("acc").unwrap(), 5);
        assert_eq!(sc.runnable(), vec![tid]);
        assert_eq!(sc.commit().unwrap(), h0);
    }

    #[test]
    fn test_stored_snapshot_matches_hash() {
        let mut sc = StateController::new();
        sc.mount(account("alice", 5)).unwrap();
        let h = sc.commit().unwrap()[0];
        let stored = sc.snapshot(&h).unwrap();
        assert_eq!(stored.content_hash().unwrap(), h);
        assert!(stored.contains_key("alice"));
    }

    #[test]
    fn test_duplicate_mount_across_kinds() {
        let mut sc = StateController::new();
        sc.mount(account("alice", 5)).unwrap();
        assert!(matches!(
            sc.mount(account("alice", 1)),
            Err(CoreError::DuplicateMount { .. })
        ));
        assert!(matches!(
            sc.mount_process("alice", withdraw(1)),
            Err(CoreError::DuplicateMount { .. })
        ));
        sc.mount_process("w", withdraw(1)).unwrap();
        assert!(matches!(
            sc.mount_as("w", account("w", 0)),
            Err(CoreError::DuplicateMount { .. })
        ));
    }

    #[test]
    fn test_choice_fans_out_commit() {
        let mut sc = StateController::new();
        sc.mount(account("alice", 5)).unwrap();
        sc.mount_process(
            "w",
            StepProcess::new("w")
                .with_local("amount", ChoiceSet::in_range(1, 5))
                .step("noop", |_| Ok(())),
        )
        .unwrap();
        let hashes = sc.commit().unwrap();
        assert_eq!(hashes.len(), 5);
        assert_eq!(sc.cas().size(), 5);
    }

    #[test]
    fn test_restore_unknown_hash() {
        let mut sc = StateController::new();
        let h = Hash::compute(b"nowhere");
        assert!(matches!(sc.restore(&h), Err(CoreError::UnknownHash { .. })));
    }

    #[test]
    fn test_restore_mount_mismatch() {
        let mut first = StateController::new();
        first.mount(account("alice", 5)).unwrap();
        let only_alice = first.commit().unwrap()[0];

        let mut second = StateController::new();
        second.mount(account("alice", 5)).unwrap();
        second.mount(account("bob", 5)).unwrap();
        let both = second.commit().unwrap()[0];

        // Stores are per controller; copy the snapshots across.
        let alice_only = first.snapshot(&only_alice).unwrap();
        second.cas.put(only_alice, (*alice_only).clone()).unwrap();
        assert!(matches!(
            second.restore(&only_alice),
            Err(CoreError::MissingMount { .. })
        ));

        let both_snap = second.snapshot(&both).unwrap();
        first.cas.put(both, (*both_snap).clone()).unwrap();
        assert!(matches!(
            first.restore(&both),
            Err(CoreError::UnknownMount { .. })
        ));
    }

    #[test]
    fn test_state_to_string() {
        let mut sc = StateController::new();
        sc.mount(account("alice", 5)).unwrap();
        sc.mount_process("w", withdraw(1)).unwrap();
        let dump = sc.state_to_string();
        assert!(dump.starts_with("alice:\n\t"));
        assert!(dump.contains("w (withdraw@withdraw):"));
        assert_eq!(sc.process_name(ThreadId(0)).as_deref(), Some("withdraw@withdraw"));
        assert_eq!(sc.process_mount(ThreadId(0)), Some("w"));
    }

    proptest::proptest! {
        #[test]
        fn prop_restore_undoes_mutation(a in -100i64..100, b in -100i64..100) {
            let mut sc = StateController::new();
            sc.mount(account("alice", a)).unwrap();
            sc.mount(account("bob", b)).unwrap();
            let h = sc.commit().unwrap();
            proptest::prop_assert_eq!(h.len(), 1);

            sc.models_mut().object_mut("alice").unwrap().set("acc", a + 1);
            sc.models_mut().object_mut("bob").unwrap().set("acc", b - 1);
            proptest::prop_assert_ne!(sc.commit().unwrap(), h.clone());

            sc.restore(&h[0]).unwrap();
            proptest::prop_assert_eq!(sc.models().object("alice").unwrap().int("acc").unwrap(), a);
            proptest::prop_assert_eq!(sc.models().object("bob").unwrap().int("acc").unwrap(), b);
        }
    }
}
