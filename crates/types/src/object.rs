//! Object identity: accounts, names, kinds and storage namespaces.

use sbor::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain prefix for namespace derivation.
const NAMESPACE_PREFIX: u8 = 0x6e;

/// The kind of verifiable object a namespace holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub enum ObjectKind {
    /// An append-only verifiable log.
    Log,
    /// A verifiable map with its mutation and tree-head sub-logs.
    Map,
}

impl ObjectKind {
    fn discriminant(self) -> u8 {
        match self {
            ObjectKind::Log => 0,
            ObjectKind::Map => 1,
        }
    }
}

/// Which log tree a read request addresses.
///
/// A map object carries two internal logs alongside its prefix tree: the
/// mutation log and the tree-head log. Both expose the full read-only log
/// surface, addressed by this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// A standalone log object.
    Log,
    /// The mutation log of a map.
    MapMutationLog,
    /// The tree-head log of a map.
    MapTreeHeadLog,
}

impl LogKind {
    /// The kind of object that owns this log.
    pub fn owner(self) -> ObjectKind {
        match self {
            LogKind::Log => ObjectKind::Log,
            LogKind::MapMutationLog | LogKind::MapTreeHeadLog => ObjectKind::Map,
        }
    }
}

/// An object addressed by account and name.
///
/// The pair is only meaningful together with an [`ObjectKind`]: one account
/// may own both a log and a map of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    /// Owning account.
    pub account: String,
    /// Object name within the account, unique per kind.
    pub name: String,
}

impl ObjectId {
    /// Create an object id.
    pub fn new(account: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            name: name.into(),
        }
    }
}

/// Isolation scope for all storage of one object.
///
/// Derived deterministically from account, name and kind; opaque bytes to
/// the substrate. There are no cross-namespace transactions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace([u8; 32]);

impl Namespace {
    /// Derive the namespace for an object.
    ///
    /// `SHA256(0x6e || len(account) LE32 || account || len(name) LE32 ||
    /// name || kind)` - length-prefixed so `("ab", "c")` and `("a", "bc")`
    /// cannot collide.
    pub fn derive(id: &ObjectId, kind: ObjectKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([NAMESPACE_PREFIX]);
        hasher.update((id.account.len() as u32).to_le_bytes());
        hasher.update(id.account.as_bytes());
        hasher.update((id.name.len() as u32).to_le_bytes());
        hasher.update(id.name.as_bytes());
        hasher.update([kind.discriminant()]);
        Self(hasher.finalize().into())
    }

    /// Raw namespace bytes, the substrate's scope key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({}..)", &hex::encode(&self.0[..4]))
    }
}

/// Permissions consulted against the authorization oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Create an object.
    Create,
    /// Destroy an object.
    Destroy,
    /// Append raw entries to a log.
    RawAdd,
    /// Read log entries.
    ReadEntry,
    /// Read tree hashes and proofs.
    ReadHash,
    /// Set, update or delete map values.
    SetValue,
    /// Read map values.
    GetValue,
}
