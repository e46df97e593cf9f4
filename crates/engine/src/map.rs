//! Sparse Merkle prefix tree over a transactional key-value scope.
//!
//! The map is conceptually a binary tree of depth 256 addressed by the
//! SHA-256 of the user key, MSB-first. Only nodes on populated key paths
//! are persisted, addressed by (depth, path prefix); an absent node's hash
//! is the precomputed constant for an empty subtree at its depth. Updating
//! a key rewrites the 257 nodes on its path and deletes any that collapse
//! back to the empty constant, so storage stays proportional to the set of
//! live keys.

use vds_storage::{keys, KeyReader, KeyWriter};
use vds_types::{
    empty_subtree, EntryRecord, Error, Hash, MapHead, Result, MAP_DEPTH,
};

/// Read the map head. A map with no head record is empty.
pub fn read_head(kr: &dyn KeyReader) -> Result<MapHead> {
    match kr.get(&keys::meta_bucket(keys::TreeRole::Object), keys::META_HEAD)? {
        Some(bytes) => sbor::basic_decode(&bytes)
            .map_err(|e| Error::Internal(format!("undecodable map head: {e:?}"))),
        None => Ok(MapHead::empty()),
    }
}

/// Persist the map head.
pub fn write_head(kw: &mut dyn KeyWriter, head: &MapHead) -> Result<()> {
    kw.set(
        &keys::meta_bucket(keys::TreeRole::Object),
        keys::META_HEAD,
        &sbor::basic_encode(head).expect("map head encoding should never fail"),
    )
}

fn node_or_empty(kr: &dyn KeyReader, depth: usize, path: &Hash) -> Result<Hash> {
    let key = keys::map_node_key(depth as u16, path);
    match kr.get(&keys::map_node_bucket(), &key)? {
        Some(bytes) if bytes.len() == Hash::BYTES => Ok(Hash::from_hash_bytes(&bytes)),
        Some(_) => Err(Error::Internal(format!("malformed map node at depth {depth}"))),
        None => Ok(empty_subtree(depth)),
    }
}

/// The stored value and leaf hash currently at `key_hash`.
///
/// Returns `(None, empty leaf)` for an unset key.
pub fn current_leaf(kr: &dyn KeyReader, key_hash: &Hash) -> Result<(Option<Vec<u8>>, Hash)> {
    match kr.get(&keys::entry_bucket(keys::TreeRole::Object), key_hash.as_bytes())? {
        Some(bytes) => {
            let record: EntryRecord = sbor::basic_decode(&bytes)
                .map_err(|e| Error::Internal(format!("undecodable map value: {e:?}")))?;
            let leaf = Hash::map_leaf(key_hash, &record.data);
            Ok((Some(record.data), leaf))
        }
        None => Ok((None, empty_subtree(MAP_DEPTH))),
    }
}

/// Store or remove the value record at `key_hash`.
pub fn write_leaf(kw: &mut dyn KeyWriter, key_hash: &Hash, value: Option<&[u8]>) -> Result<()> {
    let bucket = keys::entry_bucket(keys::TreeRole::Object);
    match value {
        Some(value) => {
            let record = EntryRecord {
                data: value.to_vec(),
            };
            kw.set(
                &bucket,
                key_hash.as_bytes(),
                &sbor::basic_encode(&record).expect("map value encoding should never fail"),
            )
        }
        None => kw.delete(&bucket, key_hash.as_bytes()),
    }
}

/// Sibling hashes along the path to `key_hash`, root to leaf.
///
/// Element d is the sibling of the path node at depth d+1, so the path
/// always has exactly 256 elements. Absent siblings come from the empty
/// table.
pub fn audit_path(kr: &dyn KeyReader, key_hash: &Hash) -> Result<Vec<Hash>> {
    let mut path = Vec::with_capacity(MAP_DEPTH);
    for depth in 0..MAP_DEPTH {
        let sibling_prefix = key_hash.flip_bit(depth).prefix(depth + 1);
        path.push(node_or_empty(kr, depth + 1, &sibling_prefix)?);
    }
    Ok(path)
}

/// Replace the leaf at `key_hash` and re-fold the path to the root.
///
/// Persists every node on the path, deleting those equal to the empty
/// constant for their depth, and returns the new root hash. Does not touch
/// the head or the value record.
pub fn update_tree(kw: &mut dyn KeyWriter, key_hash: &Hash, new_leaf: Hash) -> Result<Hash> {
    let siblings = audit_path(&*kw, key_hash)?;

    let mut hash = new_leaf;
    write_node(kw, MAP_DEPTH, key_hash, hash)?;
    for depth in (0..MAP_DEPTH).rev() {
        let sibling = siblings[depth];
        hash = if key_hash.bit(depth) {
            Hash::node(&sibling, &hash)
        } else {
            Hash::node(&hash, &sibling)
        };
        write_node(kw, depth, &key_hash.prefix(depth), hash)?;
    }
    Ok(hash)
}

fn write_node(kw: &mut dyn KeyWriter, depth: usize, path: &Hash, hash: Hash) -> Result<()> {
    let bucket = keys::map_node_bucket();
    let key = keys::map_node_key(depth as u16, path);
    if hash == empty_subtree(depth) {
        kw.delete(&bucket, &key)
    } else {
        kw.set(&bucket, &key, hash.as_bytes())
    }
}

/// Verify an audit path against a map root.
///
/// `value` is `None` for an unset key. The path must be the full 256
/// siblings in root-to-leaf order.
pub fn verify_audit_path(
    key_hash: &Hash,
    value: Option<&[u8]>,
    path: &[Hash],
    root_hash: &Hash,
) -> bool {
    if path.len() != MAP_DEPTH {
        return false;
    }
    let mut hash = match value {
        Some(value) => Hash::map_leaf(key_hash, value),
        None => empty_subtree(MAP_DEPTH),
    };
    for depth in (0..MAP_DEPTH).rev() {
        let sibling = path[depth];
        hash = if key_hash.bit(depth) {
            Hash::node(&sibling, &hash)
        } else {
            Hash::node(&hash, &sibling)
        };
    }
    hash == *root_hash
}
