//! The mutation applier: storage-level effect of one queued mutation.
//!
//! [`apply_mutation`] is a pure transformation over a [`KeyWriter`]: it
//! never opens a transaction and is always invoked inside one - either the
//! batch mutator's write overlay or a direct update scope. Applying the
//! same mutation sequence to an empty namespace reproduces bit-identical
//! storage, which is what makes a map replayable from its mutation log.

use crate::{log, map};
use tracing::debug;
use vds_storage::{keys, KeyReader, KeyWriter, TreeRole};
use vds_types::{
    empty_subtree, Error, Hash, MapHead, MapTreeHead, Mutation, ObjectInfo, ObjectKind, Result,
    MAP_DEPTH,
};

/// Read the object info record, if the namespace has ever been created.
pub fn object_info(kr: &dyn KeyReader) -> Result<Option<ObjectInfo>> {
    match kr.get(&keys::meta_bucket(TreeRole::Object), keys::META_INFO)? {
        Some(bytes) => sbor::basic_decode(&bytes)
            .map(Some)
            .map_err(|e| Error::Internal(format!("undecodable object info: {e:?}"))),
        None => Ok(None),
    }
}

/// Require a live object of the given kind.
///
/// Absent and tombstoned namespaces answer `NotFound`; a kind mismatch
/// (e.g. a log operation addressed at a map) is `InvalidRequest`.
pub fn require_object(kr: &dyn KeyReader, kind: ObjectKind) -> Result<()> {
    match object_info(kr)? {
        None => Err(Error::NotFound),
        Some(info) if info.tombstone => Err(Error::NotFound),
        Some(info) if info.kind != kind => Err(Error::InvalidRequest(format!(
            "object is a {:?}, not a {:?}",
            info.kind, kind
        ))),
        Some(_) => Ok(()),
    }
}

/// Read the namespace's size counter (leaf count for logs, mutation-log
/// size for maps). A namespace with no counter has size 0.
pub fn read_object_size(kr: &dyn KeyReader) -> Result<u64> {
    match kr.get(&keys::meta_bucket(TreeRole::Object), keys::META_SIZE)? {
        Some(bytes) => {
            keys::decode_size(&bytes).ok_or_else(|| Error::Internal("malformed size counter".into()))
        }
        None => Ok(0),
    }
}

/// Write the namespace's size counter.
pub fn write_object_size(kw: &mut dyn KeyWriter, size: u64) -> Result<()> {
    kw.set(
        &keys::meta_bucket(TreeRole::Object),
        keys::META_SIZE,
        &keys::encode_size(size),
    )
}

/// Apply one mutation, returning the namespace's new size.
pub fn apply_mutation(
    kw: &mut dyn KeyWriter,
    current_size: u64,
    mutation: &Mutation,
) -> Result<u64> {
    match mutation {
        Mutation::ObjectCreate { kind } => {
            // A tombstoned name stays taken forever within the account.
            if object_info(&*kw)?.is_some() {
                return Err(Error::AlreadyExists);
            }
            let info = ObjectInfo {
                kind: *kind,
                tombstone: false,
            };
            kw.set(
                &keys::meta_bucket(TreeRole::Object),
                keys::META_INFO,
                &sbor::basic_encode(&info).expect("object info encoding should never fail"),
            )?;
            debug!(?kind, "object created");
            Ok(current_size)
        }

        Mutation::ObjectDestroy => {
            match object_info(&*kw)? {
                None => return Err(Error::NotFound),
                Some(info) if info.tombstone => return Err(Error::NotFound),
                Some(info) => {
                    let tombstoned = ObjectInfo {
                        kind: info.kind,
                        tombstone: true,
                    };
                    kw.set(
                        &keys::meta_bucket(TreeRole::Object),
                        keys::META_INFO,
                        &sbor::basic_encode(&tombstoned)
                            .expect("object info encoding should never fail"),
                    )?;
                }
            }
            // Logical wipe: drop the heads. Remaining tree data is
            // unreachable behind the tombstone.
            for role in [TreeRole::Object, TreeRole::MutationLog, TreeRole::TreeHeadLog] {
                kw.delete(&keys::meta_bucket(role), keys::META_HEAD)?;
            }
            debug!("object destroyed");
            Ok(current_size)
        }

        Mutation::LogAdd { entry } => {
            require_object(&*kw, ObjectKind::Log)?;
            let outcome = log::append_leaf(
                kw,
                TreeRole::Object,
                Hash::leaf(entry),
                entry,
                log::DuplicatePolicy::ReturnExisting,
            )?;
            Ok(outcome.head.tree_size)
        }

        Mutation::MapSet { key, value } => {
            apply_map_mutation(kw, current_size, mutation, key, Some(value.as_slice()), None)
        }
        Mutation::MapUpdate {
            key,
            value,
            previous_leaf_hash,
        } => apply_map_mutation(
            kw,
            current_size,
            mutation,
            key,
            Some(value.as_slice()),
            Some(*previous_leaf_hash),
        ),
        Mutation::MapDelete { key } => {
            apply_map_mutation(kw, current_size, mutation, key, None, None)
        }
    }
}

fn apply_map_mutation(
    kw: &mut dyn KeyWriter,
    current_size: u64,
    mutation: &Mutation,
    key: &[u8],
    value: Option<&[u8]>,
    previous_leaf_hash: Option<Hash>,
) -> Result<u64> {
    require_object(&*kw, ObjectKind::Map)?;

    // The mutation log entry goes first: its index is the map's
    // pre-mutation size. A precondition failure below aborts the whole
    // transaction, rolling this append back with it.
    let entry = mutation.canonical_bytes();
    let mutation_log = log::append_leaf(
        kw,
        TreeRole::MutationLog,
        Hash::leaf(&entry),
        &entry,
        log::DuplicatePolicy::AppendAlways,
    )?;
    debug_assert_eq!(mutation_log.index, current_size);

    let key_hash = Hash::from_bytes(key);
    let (_, current_leaf) = map::current_leaf(&*kw, &key_hash)?;
    if let Some(required) = previous_leaf_hash {
        if current_leaf != required {
            return Err(Error::ConflictingPreviousLeaf);
        }
    }

    let new_leaf = match value {
        Some(value) => Hash::map_leaf(&key_hash, value),
        None => empty_subtree(MAP_DEPTH),
    };
    let root_hash = map::update_tree(kw, &key_hash, new_leaf)?;
    map::write_leaf(kw, &key_hash, value)?;
    map::write_head(
        kw,
        &MapHead {
            mutation_log_size: mutation_log.head.tree_size,
            root_hash,
        },
    )?;

    let tree_head = MapTreeHead {
        mutation_log: mutation_log.head,
        root_hash,
    };
    let tree_head_entry =
        sbor::basic_encode(&tree_head).expect("map tree head encoding should never fail");
    log::append_leaf(
        kw,
        TreeRole::TreeHeadLog,
        Hash::leaf(&tree_head_entry),
        &tree_head_entry,
        log::DuplicatePolicy::AppendAlways,
    )?;

    Ok(mutation_log.head.tree_size)
}
