//! Bucket names and key encodings.
//!
//! Within a namespace, storage is partitioned into named buckets. A map
//! object carries two internal logs (mutation log, tree-head log) whose
//! buckets reuse the log layout under a role prefix, so one namespace can
//! hold up to three trees without key collisions.
//!
//! All multi-byte integers are big-endian so that scans over a single
//! bucket return keys in a well-defined order (backup tooling relies on
//! this; the engines do not).

use vds_types::Hash;

/// Which tree within the namespace a bucket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeRole {
    /// The object's own tree: the log itself, or the map's prefix tree.
    Object,
    /// The mutation log of a map.
    MutationLog,
    /// The tree-head log of a map.
    TreeHeadLog,
}

impl TreeRole {
    fn prefix(self) -> &'static [u8] {
        match self {
            TreeRole::Object => b"",
            TreeRole::MutationLog => b"mutation_log_",
            TreeRole::TreeHeadLog => b"treehead_log_",
        }
    }
}

fn bucket(role: TreeRole, base: &[u8]) -> Vec<u8> {
    let prefix = role.prefix();
    let mut name = Vec::with_capacity(prefix.len() + base.len());
    name.extend_from_slice(prefix);
    name.extend_from_slice(base);
    name
}

/// `meta` bucket: `size`, `head` and `info` records.
pub fn meta_bucket(role: TreeRole) -> Vec<u8> {
    bucket(role, b"meta")
}

/// `entry` bucket: log entries by index, map values by key hash.
pub fn entry_bucket(role: TreeRole) -> Vec<u8> {
    bucket(role, b"entry")
}

/// `tree_node` bucket: log tree node hashes by (level, index).
pub fn tree_node_bucket(role: TreeRole) -> Vec<u8> {
    bucket(role, b"tree_node")
}

/// `index_leaf` bucket: leaf hash to first leaf index.
pub fn index_leaf_bucket(role: TreeRole) -> Vec<u8> {
    bucket(role, b"index_leaf")
}

/// `map_node` bucket: sparse prefix tree node hashes by (depth, path).
/// Only exists at the object level.
pub fn map_node_bucket() -> Vec<u8> {
    bucket(TreeRole::Object, b"map_node")
}

/// Key of the object size counter within `meta`.
pub const META_SIZE: &[u8] = b"size";
/// Key of the cached tree head within `meta`.
pub const META_HEAD: &[u8] = b"head";
/// Key of the object info record within `meta`.
pub const META_INFO: &[u8] = b"info";

/// Encode a leaf or entry index.
pub fn entry_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// Encode a log tree node address. Node `(level, index)` covers leaves
/// `[index << level, (index + 1) << level)`.
pub fn tree_node_key(level: u8, index: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = level;
    key[1..].copy_from_slice(&index.to_be_bytes());
    key
}

/// Encode a map node address: big-endian depth followed by the path
/// prefix (the key hash masked to `depth` bits).
pub fn map_node_key(depth: u16, path: &Hash) -> [u8; 34] {
    let mut key = [0u8; 34];
    key[..2].copy_from_slice(&depth.to_be_bytes());
    key[2..].copy_from_slice(path.as_bytes());
    key
}

/// Encode a size counter value.
pub fn encode_size(size: u64) -> [u8; 8] {
    size.to_be_bytes()
}

/// Decode a size counter value.
pub fn decode_size(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

/// Flatten `(bucket, key)` into a single substrate key.
///
/// Bucket names never contain `/`, so the separator keeps buckets
/// prefix-free and bucket scans contiguous.
pub fn storage_key(bucket: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bucket.len() + 1 + key.len());
    out.extend_from_slice(bucket);
    out.push(b'/');
    out.extend_from_slice(key);
    out
}
