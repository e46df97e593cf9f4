//! Persisted record types.
//!
//! Every structured value written to the substrate is one of these records,
//! SBOR-encoded with [`sbor::basic_encode`]. Raw 32-byte node hashes and
//! big-endian counters are stored without a record wrapper.

use crate::Hash;
use sbor::prelude::*;

/// The (size, root) pair of a log tree at a specific size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct TreeHead {
    /// Number of leaves covered by the root.
    pub tree_size: u64,
    /// Merkle root over leaves `[0, tree_size)`; [`Hash::ZERO`] at size 0.
    pub root_hash: Hash,
}

impl TreeHead {
    /// The head of an empty log.
    pub const EMPTY: Self = Self {
        tree_size: 0,
        root_hash: Hash::ZERO,
    };
}

/// Current state of a map object: the root after applying a prefix of the
/// mutation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct MapHead {
    /// Number of mutation-log entries reflected in the root.
    pub mutation_log_size: u64,
    /// Root of the sparse prefix tree.
    pub root_hash: Hash,
}

impl MapHead {
    /// The head of a freshly created map.
    pub fn empty() -> Self {
        Self {
            mutation_log_size: 0,
            root_hash: crate::empty_subtree(0),
        }
    }
}

/// The record appended to a map's tree-head log after each mutation.
///
/// Couples the map root with the mutation-log head it reflects, so a
/// client can verify the map root against the log of mutations that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct MapTreeHead {
    /// Head of the mutation log at the moment the root was produced.
    pub mutation_log: TreeHead,
    /// Root of the sparse prefix tree after applying those mutations.
    pub root_hash: Hash,
}

/// Per-namespace object metadata, stored at `meta/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct ObjectInfo {
    /// What kind of object this namespace holds.
    pub kind: crate::ObjectKind,
    /// Set by destroy. A tombstoned namespace answers `NotFound` to every
    /// operation and its name can never be reused within the account.
    pub tombstone: bool,
}

/// Wrapper for stored entry bytes.
///
/// Entries are wrapped rather than stored raw so that a zero-length client
/// entry still encodes to a non-empty value (substrates may treat an empty
/// value as a delete).
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct EntryRecord {
    /// The caller-supplied entry bytes.
    pub data: Vec<u8>,
}
