//! Write overlay for batched mutation application.
//!
//! This module provides [`WriteOverlay`], which wraps a read-only scope and
//! captures all writes without touching the underlying storage. The batch
//! mutator applies a whole batch of mutations against the overlay while
//! holding only a read-only scope, then replays the recorded writes under a
//! short read-write scope at commit time.
//!
//! Reads check the overlay first, then fall through to the base scope, so a
//! mutation observes every earlier write in the same batch. Writes are
//! recorded twice: in a lookup map for reads, and in an ordered replay list
//! - order matters because tree-node writes at level l+1 depend on writes
//! at level l within the same batch.

use crate::{KeyReader, KeyWriter};
use std::collections::HashMap;
use vds_types::Result;

/// A single recorded write, replayed verbatim at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Set `(bucket, key)` to `value`.
    Set {
        /// Target bucket.
        bucket: Vec<u8>,
        /// Target key.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove `(bucket, key)`.
    Delete {
        /// Target bucket.
        bucket: Vec<u8>,
        /// Target key.
        key: Vec<u8>,
    },
}

/// An overlay that captures writes over a read-only scope.
///
/// Dropping the overlay discards everything; nothing reaches the base
/// scope. On success the caller takes the replay list with
/// [`into_ops`](Self::into_ops) and applies it inside an update scope.
pub struct WriteOverlay<'a> {
    /// The underlying read-only scope.
    base: &'a dyn KeyReader,

    /// Lookup view of the buffered writes. `None` marks a delete.
    entries: HashMap<(Vec<u8>, Vec<u8>), Option<Vec<u8>>>,

    /// Writes in application order.
    ops: Vec<WriteOp>,
}

impl<'a> WriteOverlay<'a> {
    /// Create a new overlay over the given read-only scope.
    pub fn new(base: &'a dyn KeyReader) -> Self {
        Self {
            base,
            entries: HashMap::new(),
            ops: Vec::new(),
        }
    }

    /// Whether any writes have been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of recorded writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Consume the overlay, returning the ordered replay list.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl KeyReader for WriteOverlay<'_> {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(buffered) = self.entries.get(&(bucket.to_vec(), key.to_vec())) {
            return Ok(buffered.clone());
        }
        self.base.get(bucket, key)
    }
}

impl KeyWriter for WriteOverlay<'_> {
    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.entries
            .insert((bucket.to_vec(), key.to_vec()), Some(value.to_vec()));
        self.ops.push(WriteOp::Set {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<()> {
        self.entries.insert((bucket.to_vec(), key.to_vec()), None);
        self.ops.push(WriteOp::Delete {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
        });
        Ok(())
    }
}

/// Replay recorded writes into an update scope, preserving order.
pub fn replay(ops: &[WriteOp], kw: &mut dyn KeyWriter) -> Result<()> {
    for op in ops {
        match op {
            WriteOp::Set { bucket, key, value } => kw.set(bucket, key, value)?,
            WriteOp::Delete { bucket, key } => kw.delete(bucket, key)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed base scope for overlay tests.
    struct FixedReader(HashMap<(Vec<u8>, Vec<u8>), Vec<u8>>);

    impl KeyReader for FixedReader {
        fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self.0.get(&(bucket.to_vec(), key.to_vec())).cloned())
        }
    }

    fn base() -> FixedReader {
        let mut map = HashMap::new();
        map.insert((b"meta".to_vec(), b"size".to_vec()), vec![1]);
        FixedReader(map)
    }

    #[test]
    fn test_read_falls_through_to_base() {
        let base = base();
        let overlay = WriteOverlay::new(&base);
        assert_eq!(overlay.get(b"meta", b"size").unwrap(), Some(vec![1]));
        assert_eq!(overlay.get(b"meta", b"head").unwrap(), None);
    }

    #[test]
    fn test_write_shadows_base() {
        let base = base();
        let mut overlay = WriteOverlay::new(&base);
        overlay.set(b"meta", b"size", &[2]).unwrap();
        assert_eq!(overlay.get(b"meta", b"size").unwrap(), Some(vec![2]));
        // Base is untouched.
        assert_eq!(base.get(b"meta", b"size").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_delete_shadows_base() {
        let base = base();
        let mut overlay = WriteOverlay::new(&base);
        overlay.delete(b"meta", b"size").unwrap();
        assert_eq!(overlay.get(b"meta", b"size").unwrap(), None);
    }

    #[test]
    fn test_ops_preserve_order() {
        let base = base();
        let mut overlay = WriteOverlay::new(&base);
        overlay.set(b"tree_node", b"a", &[1]).unwrap();
        overlay.set(b"tree_node", b"b", &[2]).unwrap();
        overlay.delete(b"map_node", b"c").unwrap();
        overlay.set(b"tree_node", b"a", &[3]).unwrap();

        let ops = overlay.into_ops();
        assert_eq!(ops.len(), 4);
        assert!(matches!(&ops[0], WriteOp::Set { key, .. } if key == b"a"));
        assert!(matches!(&ops[2], WriteOp::Delete { key, .. } if key == b"c"));
        // The later write to "a" is a separate op, replayed after the first.
        assert!(matches!(&ops[3], WriteOp::Set { value, .. } if value == &[3]));
    }

    #[test]
    fn test_is_empty() {
        let base = base();
        let mut overlay = WriteOverlay::new(&base);
        assert!(overlay.is_empty());
        overlay.set(b"meta", b"size", &[9]).unwrap();
        assert!(!overlay.is_empty());
        assert_eq!(overlay.len(), 1);
    }
}
