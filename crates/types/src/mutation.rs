//! Mutation records queued onto the write path.

use crate::{Hash, ObjectKind};
use sbor::prelude::*;

/// A single queued change to one namespace.
///
/// Mutations are immutable once queued. The SBOR encoding of a `Mutation`
/// is its canonical form: map mutations are appended to the mutation log
/// as exactly these bytes, so replaying the log reproduces the map.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub enum Mutation {
    /// Create the object backing this namespace.
    ObjectCreate {
        /// Kind of object to create.
        kind: ObjectKind,
    },
    /// Destroy the object: logical wipe plus a tombstone that prevents
    /// name reuse within the account.
    ObjectDestroy,
    /// Append an entry to a log object.
    LogAdd {
        /// Raw entry bytes.
        entry: Vec<u8>,
    },
    /// Set a map key to a value.
    MapSet {
        /// User key (unhashed).
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Set a map key to a value iff the current leaf matches.
    MapUpdate {
        /// User key (unhashed).
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
        /// Required hash of the current leaf; mismatch fails the mutation
        /// with `ConflictingPreviousLeaf`.
        previous_leaf_hash: Hash,
    },
    /// Remove a map key.
    MapDelete {
        /// User key (unhashed).
        key: Vec<u8>,
    },
}

impl Mutation {
    /// Canonical byte encoding, used as the mutation-log entry.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        sbor::basic_encode(self).expect("mutation encoding should never fail")
    }

    /// Decode a mutation from its canonical bytes.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        sbor::basic_decode(bytes).ok()
    }
}
