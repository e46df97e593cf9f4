//! In-memory transactional storage.
//!
//! Uses `im::OrdMap` for O(1) structural-sharing clones, so read-only
//! scopes take a consistent snapshot without copying the dataset and a
//! long-lived read scope never blocks writers. This matters for the batch
//! mutator, which holds a read-only scope across an entire batch of
//! hashing work.
//!
//! Update scopes are serialised by a single writer mutex per store; a
//! transaction works against a structurally-shared copy of the namespace
//! and swaps it in atomically on success, so a failed body leaves no trace.

use im::OrdMap;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use vds_storage::{keys, KeyReader, KeyWriter, StorageReader, StorageWriter};
use vds_types::{Namespace, Result};

type NamespaceData = OrdMap<Vec<u8>, Vec<u8>>;

/// In-memory storage for tests and embedded deployments.
///
/// Namespaces are fully isolated: each maps to its own ordered key space,
/// and scopes only ever touch one namespace. Keys are the flattened
/// `bucket/key` form from [`vds_storage::keys::storage_key`], so a range
/// scan over one bucket would return keys in lexicographic order.
pub struct MemoryStore {
    /// Committed state per namespace.
    data: RwLock<HashMap<[u8; 32], NamespaceData>>,

    /// Serialises update scopes. Readers are not blocked by this -
    /// they only take the `data` read lock long enough to clone a map.
    writer: Mutex<()>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    fn snapshot(&self, ns: &Namespace) -> NamespaceData {
        let data = self.data.read().unwrap();
        data.get(ns.as_bytes()).cloned().unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageReader for MemoryStore {
    fn execute_read_only<T>(
        &self,
        ns: &Namespace,
        body: impl FnOnce(&dyn KeyReader) -> Result<T>,
    ) -> Result<T> {
        let snapshot = MemorySnapshot {
            data: self.snapshot(ns),
        };
        body(&snapshot)
    }
}

impl StorageWriter for MemoryStore {
    fn execute_update<T>(
        &self,
        ns: &Namespace,
        body: impl FnOnce(&mut dyn KeyWriter) -> Result<T>,
    ) -> Result<T> {
        let _writer = self.writer.lock().unwrap();

        let mut txn = MemoryTransaction {
            data: self.snapshot(ns),
        };
        let value = body(&mut txn)?;

        // Clean return: publish the working copy atomically.
        let mut data = self.data.write().unwrap();
        data.insert(*ns.as_bytes(), txn.data);
        Ok(value)
    }
}

/// Consistent point-in-time view of one namespace.
///
/// The clone is O(1) - only reference counts are touched - and the view
/// is immune to concurrent commits.
struct MemorySnapshot {
    data: NamespaceData,
}

impl KeyReader for MemorySnapshot {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&keys::storage_key(bucket, key)).cloned())
    }
}

/// Working copy of one namespace inside an update scope.
struct MemoryTransaction {
    data: NamespaceData,
}

impl KeyReader for MemoryTransaction {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&keys::storage_key(bucket, key)).cloned())
    }
}

impl KeyWriter for MemoryTransaction {
    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.data.insert(keys::storage_key(bucket, key), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<()> {
        self.data.remove(&keys::storage_key(bucket, key));
        Ok(())
    }
}
