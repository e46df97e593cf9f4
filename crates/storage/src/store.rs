//! Transactional key-value substrate traits.
//!
//! This module defines the storage abstraction the engines run on.
//!
//! # Design
//!
//! The engines never hold a database handle: every operation runs inside a
//! scope opened by [`StorageReader::execute_read_only`] or
//! [`StorageWriter::execute_update`], scoped to exactly one namespace.
//! A scope body receives a [`KeyReader`] (or [`KeyWriter`]), does its work,
//! and returns; on a clean return from an update scope all writes become
//! atomically visible, on an error they are all discarded.
//!
//! The substrate is free to implement this over a file-backed B-tree, an
//! in-memory map with a single writer lock, or a remote transactional
//! store. The engines rely on two guarantees: each scope is serializable,
//! and a reader that starts after a writer commits sees all of that
//! writer's effects.

use vds_types::{Namespace, Result};

/// Read access to one namespace's buckets within a scope.
pub trait KeyReader {
    /// Fetch the value at `(bucket, key)`, or `None` if absent.
    ///
    /// Absence is not an error: engines substitute defaults (empty heads,
    /// empty subtree hashes) where the contract allows. Substrate failures
    /// surface as `Err(StorageUnavailable)`.
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Write access to one namespace's buckets within an update scope.
///
/// Every writer is also a reader and observes its own uncommitted writes.
pub trait KeyWriter: KeyReader {
    /// Set the value at `(bucket, key)`.
    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove the value at `(bucket, key)`. Removing an absent key is a
    /// no-op.
    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<()>;
}

/// Opens read-only scopes on namespaces.
pub trait StorageReader: Send + Sync {
    /// Run `body` against a consistent snapshot of `ns`.
    ///
    /// The snapshot is taken when the scope opens; concurrent commits are
    /// not visible inside it.
    fn execute_read_only<T>(
        &self,
        ns: &Namespace,
        body: impl FnOnce(&dyn KeyReader) -> Result<T>,
    ) -> Result<T>;
}

/// Opens read-write scopes on namespaces.
pub trait StorageWriter: StorageReader {
    /// Run `body` in a transaction on `ns`.
    ///
    /// If `body` returns `Ok`, all writes commit atomically; if it returns
    /// `Err`, every write is discarded and the error is returned. Writes
    /// are invisible to other scopes until commit.
    fn execute_update<T>(
        &self,
        ns: &Namespace,
        body: impl FnOnce(&mut dyn KeyWriter) -> Result<T>,
    ) -> Result<T>;
}
