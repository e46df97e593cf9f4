//! The service facade: authorization, validation and dispatch.
//!
//! `LocalService` is a stateless dispatcher. Reads open one read-only
//! scope and delegate to the engines; writes build the canonical
//! [`Mutation`], hand it to the mutator, and await durability before
//! returning, so a read issued after a write returns is guaranteed to
//! observe it. Wire encoding, transport and policy content are the
//! embedder's concern.

use crate::auth::AuthorizationOracle;
use std::sync::Arc;
use tracing::debug;
use vds_engine::{apply, log, map};
use vds_mutator::BatchMutator;
use vds_storage::{KeyReader, StorageReader, TreeRole};
use vds_types::{
    Error, Hash, LogKind, MapHead, MapTreeHead, Mutation, Namespace, ObjectId, ObjectKind,
    Permission, Result, TreeHead,
};

/// How an inclusion-proof request names its leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafLocator {
    /// By leaf index.
    Index(u64),
    /// By RFC 6962 leaf hash; resolves to the first occurrence.
    LeafHash(Hash),
}

/// Inclusion proof response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    /// Index of the proven leaf.
    pub leaf_index: u64,
    /// Tree size the proof is anchored to (HEAD sentinel resolved).
    pub tree_size: u64,
    /// Sibling hashes, leaf to root.
    pub audit_path: Vec<Hash>,
}

/// Consistency proof response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyProof {
    /// The older tree size.
    pub first: u64,
    /// The newer tree size (HEAD sentinel resolved).
    pub second: u64,
    /// Sibling hashes per RFC 6962.
    pub audit_path: Vec<Hash>,
}

/// Map value lookup response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapValue {
    /// Stored value bytes; `None` for an unset or deleted key.
    pub value: Option<Vec<u8>>,
    /// The 256 path siblings, root to leaf.
    pub audit_path: Vec<Hash>,
    /// The map head the path reconstructs to.
    pub head: MapHead,
}

/// The service facade over one storage substrate.
pub struct LocalService<S> {
    storage: Arc<S>,
    mutator: BatchMutator,
    access: Arc<dyn AuthorizationOracle>,
}

impl<S: StorageReader> LocalService<S> {
    /// Create a facade over `storage`, writing through `mutator`.
    ///
    /// The mutator must be the single writer for every namespace this
    /// service serves.
    pub fn new(
        storage: Arc<S>,
        mutator: BatchMutator,
        access: Arc<dyn AuthorizationOracle>,
    ) -> Self {
        Self {
            storage,
            mutator,
            access,
        }
    }

    fn check(&self, id: &ObjectId, kind: ObjectKind, permission: Permission) -> Result<Namespace> {
        self.access
            .verify_allowed(&id.account, &id.name, kind, permission)?;
        if id.name.is_empty() {
            return Err(Error::InvalidRequest("empty object name".into()));
        }
        Ok(Namespace::derive(id, kind))
    }

    async fn write(&self, ns: Namespace, mutation: Mutation) -> Result<()> {
        self.mutator.queue(ns, mutation).wait().await
    }

    // ── Log object lifecycle ─────────────────────────────────────────

    /// Create a log object.
    pub async fn log_create(&self, id: &ObjectId) -> Result<()> {
        let ns = self.check(id, ObjectKind::Log, Permission::Create)?;
        debug!(account = %id.account, name = %id.name, "log create");
        self.write(
            ns,
            Mutation::ObjectCreate {
                kind: ObjectKind::Log,
            },
        )
        .await
    }

    /// Destroy a log object. The name is permanently retired.
    pub async fn log_destroy(&self, id: &ObjectId) -> Result<()> {
        let ns = self.check(id, ObjectKind::Log, Permission::Destroy)?;
        debug!(account = %id.account, name = %id.name, "log destroy");
        self.write(ns, Mutation::ObjectDestroy).await
    }

    /// Append an entry to a log, returning its leaf hash.
    pub async fn log_add_entry(&self, id: &ObjectId, entry: Vec<u8>) -> Result<Hash> {
        let ns = self.check(id, ObjectKind::Log, Permission::RawAdd)?;
        let leaf_hash = Hash::leaf(&entry);
        self.write(ns, Mutation::LogAdd { entry }).await?;
        Ok(leaf_hash)
    }

    // ── Log reads (logs and map sub-logs) ────────────────────────────

    /// Tree head at `tree_size` (0 = current).
    pub fn log_tree_hash(&self, id: &ObjectId, kind: LogKind, tree_size: u64) -> Result<TreeHead> {
        let ns = self.check(id, kind.owner(), Permission::ReadHash)?;
        self.storage.execute_read_only(&ns, |kr| {
            apply::require_object(kr, kind.owner())?;
            log::tree_hash(kr, role_for(kind), tree_size)
        })
    }

    /// Inclusion proof for a leaf at `tree_size` (0 = current).
    pub fn log_inclusion_proof(
        &self,
        id: &ObjectId,
        kind: LogKind,
        leaf: LeafLocator,
        tree_size: u64,
    ) -> Result<InclusionProof> {
        let ns = self.check(id, kind.owner(), Permission::ReadHash)?;
        self.storage.execute_read_only(&ns, |kr| {
            apply::require_object(kr, kind.owner())?;
            let role = role_for(kind);
            let leaf_index = match leaf {
                LeafLocator::Index(index) => index,
                LeafLocator::LeafHash(hash) => {
                    log::index_for_leaf(kr, role, &hash)?.ok_or(Error::NotFound)?
                }
            };
            let head = log::read_head(kr, role)?;
            let tree_size = if tree_size == 0 { head.tree_size } else { tree_size };
            let audit_path = log::inclusion_proof(kr, role, leaf_index, tree_size)?;
            Ok(InclusionProof {
                leaf_index,
                tree_size,
                audit_path,
            })
        })
    }

    /// Consistency proof between two tree sizes (second 0 = current).
    pub fn log_consistency_proof(
        &self,
        id: &ObjectId,
        kind: LogKind,
        first: u64,
        second: u64,
    ) -> Result<ConsistencyProof> {
        let ns = self.check(id, kind.owner(), Permission::ReadHash)?;
        self.storage.execute_read_only(&ns, |kr| {
            apply::require_object(kr, kind.owner())?;
            let role = role_for(kind);
            let head = log::read_head(kr, role)?;
            let second = if second == 0 { head.tree_size } else { second };
            let audit_path = log::consistency_proof(kr, role, first, second)?;
            Ok(ConsistencyProof {
                first,
                second,
                audit_path,
            })
        })
    }

    /// Fetch raw entry bytes by index.
    pub fn log_get_entry(&self, id: &ObjectId, kind: LogKind, index: u64) -> Result<Vec<u8>> {
        let ns = self.check(id, kind.owner(), Permission::ReadEntry)?;
        self.storage.execute_read_only(&ns, |kr| {
            apply::require_object(kr, kind.owner())?;
            log::get_entry(kr, role_for(kind), index)
        })
    }

    // ── Map object lifecycle ─────────────────────────────────────────

    /// Create a map object.
    pub async fn map_create(&self, id: &ObjectId) -> Result<()> {
        let ns = self.check(id, ObjectKind::Map, Permission::Create)?;
        debug!(account = %id.account, name = %id.name, "map create");
        self.write(
            ns,
            Mutation::ObjectCreate {
                kind: ObjectKind::Map,
            },
        )
        .await
    }

    /// Destroy a map object. The name is permanently retired.
    pub async fn map_destroy(&self, id: &ObjectId) -> Result<()> {
        let ns = self.check(id, ObjectKind::Map, Permission::Destroy)?;
        debug!(account = %id.account, name = %id.name, "map destroy");
        self.write(ns, Mutation::ObjectDestroy).await
    }

    // ── Map writes ───────────────────────────────────────────────────

    /// Set `key` to `value`. Returns the leaf hash of the mutation-log
    /// entry this produces.
    pub async fn map_set(&self, id: &ObjectId, key: Vec<u8>, value: Vec<u8>) -> Result<Hash> {
        let ns = self.check(id, ObjectKind::Map, Permission::SetValue)?;
        let mutation = Mutation::MapSet { key, value };
        let leaf_hash = Hash::leaf(&mutation.canonical_bytes());
        self.write(ns, mutation).await?;
        Ok(leaf_hash)
    }

    /// Set `key` to `value` iff the current leaf hash matches.
    pub async fn map_update(
        &self,
        id: &ObjectId,
        key: Vec<u8>,
        value: Vec<u8>,
        previous_leaf_hash: Hash,
    ) -> Result<Hash> {
        let ns = self.check(id, ObjectKind::Map, Permission::SetValue)?;
        let mutation = Mutation::MapUpdate {
            key,
            value,
            previous_leaf_hash,
        };
        let leaf_hash = Hash::leaf(&mutation.canonical_bytes());
        self.write(ns, mutation).await?;
        Ok(leaf_hash)
    }

    /// Remove `key`. Returns the leaf hash of the mutation-log entry.
    pub async fn map_delete(&self, id: &ObjectId, key: Vec<u8>) -> Result<Hash> {
        let ns = self.check(id, ObjectKind::Map, Permission::SetValue)?;
        let mutation = Mutation::MapDelete { key };
        let leaf_hash = Hash::leaf(&mutation.canonical_bytes());
        self.write(ns, mutation).await?;
        Ok(leaf_hash)
    }

    // ── Map reads ────────────────────────────────────────────────────

    /// Look up `key` with its audit path.
    ///
    /// `tree_size` must be 0 (current) or the current mutation-log size:
    /// the persisted node layout is unversioned, so audit paths are only
    /// materialisable at the head.
    pub fn map_get(&self, id: &ObjectId, key: &[u8], tree_size: u64) -> Result<MapValue> {
        let ns = self.check(id, ObjectKind::Map, Permission::GetValue)?;
        self.storage.execute_read_only(&ns, |kr| {
            apply::require_object(kr, ObjectKind::Map)?;
            let head = map::read_head(kr)?;
            if tree_size != 0 && tree_size != head.mutation_log_size {
                return Err(Error::InvalidTreeRange);
            }
            let key_hash = Hash::from_bytes(key);
            let (value, _) = map::current_leaf(kr, &key_hash)?;
            let audit_path = map::audit_path(kr, &key_hash)?;
            Ok(MapValue {
                value,
                audit_path,
                head,
            })
        })
    }

    /// Map tree head at `tree_size` (0 = current). Historical sizes are
    /// served from the tree-head log.
    pub fn map_tree_head(&self, id: &ObjectId, tree_size: u64) -> Result<MapTreeHead> {
        let ns = self.check(id, ObjectKind::Map, Permission::ReadHash)?;
        self.storage.execute_read_only(&ns, |kr| {
            apply::require_object(kr, ObjectKind::Map)?;
            map_tree_head_at(kr, tree_size)
        })
    }
}

fn role_for(kind: LogKind) -> TreeRole {
    match kind {
        LogKind::Log => TreeRole::Object,
        LogKind::MapMutationLog => TreeRole::MutationLog,
        LogKind::MapTreeHeadLog => TreeRole::TreeHeadLog,
    }
}

fn map_tree_head_at(kr: &dyn KeyReader, tree_size: u64) -> Result<MapTreeHead> {
    let head = map::read_head(kr)?;
    if tree_size == 0 || tree_size == head.mutation_log_size {
        return Ok(MapTreeHead {
            mutation_log: log::read_head(kr, TreeRole::MutationLog)?,
            root_hash: head.root_hash,
        });
    }
    if tree_size > head.mutation_log_size {
        return Err(Error::InvalidTreeRange);
    }
    // One tree head per mutation: entry n-1 carries the head at size n.
    let entry = log::get_entry(kr, TreeRole::TreeHeadLog, tree_size - 1)?;
    sbor::basic_decode(&entry)
        .map_err(|e| Error::Internal(format!("undecodable tree head entry: {e:?}")))
}
