//! Content-addressed snapshot store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use timewinder_core::{CoreError, CoreResult, Hash, Snapshot};

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasConfig {
    /// Maximum number of distinct snapshots (0 = unlimited)
    pub max_objects: usize,
}

impl CasConfig {
    /// Set the object limit
    #[must_use]
    pub fn with_max_objects(mut self, max: usize) -> Self {
        self.max_objects = max;
        self
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasStats {
    /// Number of distinct snapshots
    pub object_count: usize,
    /// Number of put calls
    pub put_count: u64,
    /// Puts of a hash that was already stored
    pub duplicate_puts: u64,
}

/// A write-once map from hash to flat snapshot
pub trait Cas {
    /// Store a flat snapshot under its hash
    ///
    /// Returns `true` if the snapshot was not stored before.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot is not flat or the store is full
    fn put(&mut self, hash: Hash, snapshot: Snapshot) -> CoreResult<bool>;

    /// Look up a snapshot
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownHash`] if nothing is stored under `hash`
    fn get(&self, hash: &Hash) -> CoreResult<Arc<Snapshot>>;

    /// Check if a hash is stored
    fn contains(&self, hash: &Hash) -> bool;

    /// Number of distinct stored snapshots
    fn size(&self) -> usize;
}

/// In-memory content store
#[derive(Debug, Default)]
pub struct MemoryCas {
    /// Store configuration
    config: CasConfig,
    /// Snapshots indexed by hash
    objects: HashMap<Hash, Arc<Snapshot>>,
    /// Store statistics
    stats: CasStats,
}

impl MemoryCas {
    /// Create a new content store
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CasConfig::default())
    }

    /// Create with custom configuration
    #[must_use]
    pub fn with_config(config: CasConfig) -> Self {
        Self {
            config,
            objects: HashMap::new(),
            stats: CasStats::default(),
        }
    }

    /// Replace the configuration; stored objects are kept
    pub fn set_config(&mut self, config: CasConfig) {
        self.config = config;
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    /// Get store statistics
    #[must_use]
    pub fn stats(&self) -> CasStats {
        CasStats {
            object_count: self.objects.len(),
            ..self.stats.clone()
        }
    }

    /// List all stored hashes
    #[must_use]
    pub fn list(&self) -> Vec<Hash> {
        self.objects.keys().copied().collect()
    }

    /// Drop every snapshot not in `keep` and reset the statistics
    pub fn retain(&mut self, keep: &[Hash]) {
        self.objects.retain(|hash, _| keep.contains(hash));
        self.stats = CasStats::default();
    }
}

impl Cas for MemoryCas {
    fn put(&mut self, hash: Hash, snapshot: Snapshot) -> CoreResult<bool> {
        if let Some(path) = snapshot.first_choice() {
            return Err(CoreError::NotFlat { path });
        }
        self.stats.put_count += 1;

        if self.objects.contains_key(&hash) {
            self.stats.duplicate_puts += 1;
            return Ok(false);
        }

        if self.config.max_objects > 0 && self.objects.len() >= self.config.max_objects {
            return Err(CoreError::CapacityExceeded {
                resource: "cas".to_string(),
                limit: self.config.max_objects,
            });
        }

        self.objects.insert(hash, Arc::new(snapshot));
        Ok(true)
    }

    fn get(&self, hash: &Hash) -> CoreResult<Arc<Snapshot>> {
        self.objects
            .get(hash)
            .cloned()
            .ok_or_else(|| CoreError::UnknownHash {
                hash: hash.to_hex(),
            })
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.objects.contains_key(hash)
    }

    fn size(&self) -> usize {
        self.objects.len()
    }
}
