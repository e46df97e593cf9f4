//! Append-only Merkle log over a transactional key-value scope.
//!
//! The log persists one node hash per (level, index): level 0 holds leaf
//! hashes, and node `(l, i)` covers leaves `[i·2^l, (i+1)·2^l)`. Appending
//! leaf s stores the leaf node and then folds upward while the index is
//! odd, so every complete subtree that has ever existed stays persisted.
//! Roots, inclusion paths and consistency paths at any historical size are
//! then assembled from O(log n) stored nodes.
//!
//! All functions operate through a scope ([`KeyReader`] / [`KeyWriter`])
//! and never open transactions themselves.

use tracing::warn;
use vds_storage::{keys, KeyReader, KeyWriter, TreeRole};
use vds_types::{EntryRecord, Error, Hash, Result, TreeHead};

/// What to do when an appended entry's leaf hash is already indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Return the first occurrence's index without growing the log.
    /// Client-facing log appends use this.
    ReturnExisting,
    /// Append regardless. The map's internal logs use this: two identical
    /// mutations are two log entries.
    AppendAlways,
}

/// Result of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Index assigned to the entry (or the existing index for a
    /// deduplicated append).
    pub index: u64,
    /// Head after the append.
    pub head: TreeHead,
    /// Leaf hash of the entry.
    pub leaf_hash: Hash,
    /// False when the duplicate policy short-circuited.
    pub appended: bool,
}

/// Read the cached head of a log tree. A tree with no head record is
/// empty.
pub fn read_head(kr: &dyn KeyReader, role: TreeRole) -> Result<TreeHead> {
    match kr.get(&keys::meta_bucket(role), keys::META_HEAD)? {
        Some(bytes) => sbor::basic_decode(&bytes)
            .map_err(|e| Error::Internal(format!("undecodable tree head: {e:?}"))),
        None => Ok(TreeHead::EMPTY),
    }
}

fn read_node(kr: &dyn KeyReader, role: TreeRole, level: u8, index: u64) -> Result<Hash> {
    match kr.get(&keys::tree_node_bucket(role), &keys::tree_node_key(level, index))? {
        Some(bytes) if bytes.len() == Hash::BYTES => Ok(Hash::from_hash_bytes(&bytes)),
        Some(_) => Err(Error::Internal(format!(
            "malformed tree node ({level}, {index})"
        ))),
        None => {
            warn!(level, index, "missing interior tree node");
            Err(Error::Internal(format!(
                "missing tree node ({level}, {index})"
            )))
        }
    }
}

/// Look up the first leaf index recorded for a leaf hash.
pub fn index_for_leaf(kr: &dyn KeyReader, role: TreeRole, leaf_hash: &Hash) -> Result<Option<u64>> {
    match kr.get(&keys::index_leaf_bucket(role), leaf_hash.as_bytes())? {
        Some(bytes) => keys::decode_size(&bytes)
            .map(Some)
            .ok_or_else(|| Error::Internal("malformed leaf index".into())),
        None => Ok(None),
    }
}

/// Append an entry to the log tree.
///
/// Stores the entry bytes and leaf node, folds completed sibling pairs
/// upward, and refreshes the cached head. `leaf_hash` must be the RFC 6962
/// leaf hash of `entry`.
pub fn append_leaf(
    kw: &mut dyn KeyWriter,
    role: TreeRole,
    leaf_hash: Hash,
    entry: &[u8],
    policy: DuplicatePolicy,
) -> Result<AppendOutcome> {
    let existing = index_for_leaf(&*kw, role, &leaf_hash)?;
    if policy == DuplicatePolicy::ReturnExisting {
        if let Some(index) = existing {
            return Ok(AppendOutcome {
                index,
                head: read_head(&*kw, role)?,
                leaf_hash,
                appended: false,
            });
        }
    }

    let head = read_head(&*kw, role)?;
    let index = head.tree_size;

    let record = EntryRecord {
        data: entry.to_vec(),
    };
    kw.set(
        &keys::entry_bucket(role),
        &keys::entry_key(index),
        &sbor::basic_encode(&record).expect("entry record encoding should never fail"),
    )?;
    kw.set(
        &keys::tree_node_bucket(role),
        &keys::tree_node_key(0, index),
        leaf_hash.as_bytes(),
    )?;
    // First occurrence wins so proof-by-hash lookups stay stable.
    if existing.is_none() {
        kw.set(
            &keys::index_leaf_bucket(role),
            leaf_hash.as_bytes(),
            &keys::encode_size(index),
        )?;
    }

    // Fold completed sibling pairs upward.
    let mut level: u8 = 0;
    let mut i = index;
    let mut hash = leaf_hash;
    while i % 2 == 1 {
        let sibling = read_node(&*kw, role, level, i - 1)?;
        hash = Hash::node(&sibling, &hash);
        level += 1;
        i = (i - 1) / 2;
        kw.set(
            &keys::tree_node_bucket(role),
            &keys::tree_node_key(level, i),
            hash.as_bytes(),
        )?;
    }

    let tree_size = index + 1;
    let root_hash = subtree_root(&*kw, role, 0, tree_size)?;
    let head = TreeHead {
        tree_size,
        root_hash,
    };
    kw.set(
        &keys::meta_bucket(role),
        keys::META_HEAD,
        &sbor::basic_encode(&head).expect("tree head encoding should never fail"),
    )?;

    Ok(AppendOutcome {
        index,
        head,
        leaf_hash,
        appended: true,
    })
}

/// Tree head at `tree_size`. Size 0 is the HEAD sentinel: it returns the
/// current head, which for an empty log is (0, [`Hash::ZERO`]).
pub fn tree_hash(kr: &dyn KeyReader, role: TreeRole, tree_size: u64) -> Result<TreeHead> {
    let head = read_head(kr, role)?;
    if tree_size == 0 || tree_size == head.tree_size {
        return Ok(head);
    }
    if tree_size > head.tree_size {
        return Err(Error::InvalidTreeRange);
    }
    Ok(TreeHead {
        tree_size,
        root_hash: subtree_root(kr, role, 0, tree_size)?,
    })
}

/// Fetch raw entry bytes by index. The caller decodes them per content
/// type.
pub fn get_entry(kr: &dyn KeyReader, role: TreeRole, index: u64) -> Result<Vec<u8>> {
    let head = read_head(kr, role)?;
    if index >= head.tree_size {
        return Err(Error::InvalidTreeRange);
    }
    let bytes = kr
        .get(&keys::entry_bucket(role), &keys::entry_key(index))?
        .ok_or_else(|| Error::Internal(format!("missing entry {index}")))?;
    let record: EntryRecord = sbor::basic_decode(&bytes)
        .map_err(|e| Error::Internal(format!("undecodable entry {index}: {e:?}")))?;
    Ok(record.data)
}

/// RFC 6962 inclusion path for `leaf_index` in the tree of `tree_size`
/// leaves, ordered leaf to root.
pub fn inclusion_proof(
    kr: &dyn KeyReader,
    role: TreeRole,
    leaf_index: u64,
    tree_size: u64,
) -> Result<Vec<Hash>> {
    let head = read_head(kr, role)?;
    let tree_size = if tree_size == 0 {
        head.tree_size
    } else {
        tree_size
    };
    if tree_size > head.tree_size || leaf_index >= tree_size {
        return Err(Error::InvalidTreeRange);
    }
    let mut path = Vec::new();
    inclusion_path(kr, role, leaf_index, 0, tree_size, &mut path)?;
    Ok(path)
}

fn inclusion_path(
    kr: &dyn KeyReader,
    role: TreeRole,
    m: u64,
    lo: u64,
    hi: u64,
    out: &mut Vec<Hash>,
) -> Result<()> {
    let width = hi - lo;
    if width == 1 {
        return Ok(());
    }
    let k = largest_power_of_two_below(width);
    if m - lo < k {
        inclusion_path(kr, role, m, lo, lo + k, out)?;
        out.push(subtree_root(kr, role, lo + k, hi)?);
    } else {
        inclusion_path(kr, role, m, lo + k, hi, out)?;
        out.push(subtree_root(kr, role, lo, lo + k)?);
    }
    Ok(())
}

/// RFC 6962 consistency path between tree sizes `first` and `second`.
///
/// `first == 0` and `first == second` yield an empty path.
pub fn consistency_proof(
    kr: &dyn KeyReader,
    role: TreeRole,
    first: u64,
    second: u64,
) -> Result<Vec<Hash>> {
    let head = read_head(kr, role)?;
    if first > second || second > head.tree_size {
        return Err(Error::InvalidTreeRange);
    }
    if first == 0 || first == second {
        return Ok(Vec::new());
    }
    let mut path = Vec::new();
    consistency_subproof(kr, role, first, 0, second, true, &mut path)?;
    Ok(path)
}

fn consistency_subproof(
    kr: &dyn KeyReader,
    role: TreeRole,
    m: u64,
    lo: u64,
    hi: u64,
    whole_subtree: bool,
    out: &mut Vec<Hash>,
) -> Result<()> {
    let n = hi - lo;
    if m == n {
        if !whole_subtree {
            out.push(subtree_root(kr, role, lo, hi)?);
        }
        return Ok(());
    }
    let k = largest_power_of_two_below(n);
    if m <= k {
        consistency_subproof(kr, role, m, lo, lo + k, whole_subtree, out)?;
        out.push(subtree_root(kr, role, lo + k, hi)?);
    } else {
        consistency_subproof(kr, role, m - k, lo + k, hi, false, out)?;
        out.push(subtree_root(kr, role, lo, lo + k)?);
    }
    Ok(())
}

/// Root of the leaf range `[lo, hi)`, assembled from persisted nodes.
///
/// Complete aligned subranges are single stored nodes; partial ranges
/// split at the largest power of two and combine recursively, which is the
/// RFC 6962 aggregation.
fn subtree_root(kr: &dyn KeyReader, role: TreeRole, lo: u64, hi: u64) -> Result<Hash> {
    debug_assert!(lo < hi);
    let width = hi - lo;
    if width.is_power_of_two() && lo % width == 0 {
        let level = width.trailing_zeros() as u8;
        return read_node(kr, role, level, lo >> level);
    }
    let k = largest_power_of_two_below(width);
    let left = subtree_root(kr, role, lo, lo + k)?;
    let right = subtree_root(kr, role, lo + k, hi)?;
    Ok(Hash::node(&left, &right))
}

/// Largest power of two strictly less than `n`. Requires `n >= 2`.
fn largest_power_of_two_below(n: u64) -> u64 {
    debug_assert!(n >= 2);
    1u64 << (63 - (n - 1).leading_zeros())
}

/// Verify an RFC 6962 inclusion path against a root.
pub fn verify_inclusion(
    leaf_hash: &Hash,
    leaf_index: u64,
    tree_size: u64,
    path: &[Hash],
    root_hash: &Hash,
) -> bool {
    if leaf_index >= tree_size {
        return false;
    }
    let mut fnode = leaf_index;
    let mut snode = tree_size - 1;
    let mut hash = *leaf_hash;
    for sibling in path {
        if snode == 0 {
            return false;
        }
        if fnode % 2 == 1 || fnode == snode {
            hash = Hash::node(sibling, &hash);
            if fnode % 2 == 0 {
                while fnode % 2 == 0 && fnode != 0 {
                    fnode >>= 1;
                    snode >>= 1;
                }
            }
        } else {
            hash = Hash::node(&hash, sibling);
        }
        fnode >>= 1;
        snode >>= 1;
    }
    snode == 0 && hash == *root_hash
}

/// Verify an RFC 6962 consistency path between two heads.
pub fn verify_consistency(first: &TreeHead, second: &TreeHead, path: &[Hash]) -> bool {
    if first.tree_size > second.tree_size {
        return false;
    }
    if first.tree_size == 0 {
        return path.is_empty();
    }
    if first.tree_size == second.tree_size {
        return path.is_empty() && first.root_hash == second.root_hash;
    }

    // An old size that is an exact power of two is itself a node of the
    // new tree, so the proof omits it and we seed with the old root.
    let mut path = path.iter();
    let (mut fr, mut sr) = if first.tree_size.is_power_of_two() {
        (first.root_hash, first.root_hash)
    } else {
        match path.next() {
            Some(seed) => (*seed, *seed),
            None => return false,
        }
    };

    let mut fnode = first.tree_size - 1;
    let mut snode = second.tree_size - 1;
    while fnode % 2 == 1 {
        fnode >>= 1;
        snode >>= 1;
    }

    for sibling in path {
        if snode == 0 {
            return false;
        }
        if fnode % 2 == 1 || fnode == snode {
            fr = Hash::node(sibling, &fr);
            sr = Hash::node(sibling, &sr);
            if fnode % 2 == 0 {
                while fnode % 2 == 0 && fnode != 0 {
                    fnode >>= 1;
                    snode >>= 1;
                }
            }
        } else {
            sr = Hash::node(&sr, sibling);
        }
        fnode >>= 1;
        snode >>= 1;
    }

    snode == 0 && fr == first.root_hash && sr == second.root_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use vds_storage::{StorageReader, StorageWriter};
    use vds_storage_memory::MemoryStore;
    use vds_types::{Namespace, ObjectId, ObjectKind};

    /// The classic RFC 6962 test leaves.
    fn test_leaves() -> Vec<Vec<u8>> {
        [
            "",
            "00",
            "10",
            "2021",
            "3031",
            "40414243",
            "5051525354555657",
            "606162636465666768696a6b6c6d6e6f",
        ]
        .iter()
        .map(|s| hex::decode(s).unwrap())
        .collect()
    }

    /// Known RFC 6962 roots for prefixes of [`test_leaves`].
    const KNOWN_ROOTS: [&str; 8] = [
        "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d",
        "fac54203e7cc696cf0dfcb42c92a1d9dbaf70ad9e621f4bd8d98662f00e3c125",
        "aeb6bcfe274b70a14fb067a5e5578264db0fa9b51af5e0ba159158f329e06e77",
        "d37ee418976dd95753c1c73862b9398fa2a2cf9b4ff0fdfe8b30cd95209614b7",
        "4e3bbb1f7b478dcfe71fb631631519a3bca12c9aefca1612bfce4c13a86264d4",
        "76e67dadbcdf1e10e1b74ddc608abd2f98dfb16fbce75277b5232a127f2087ef",
        "ddb89be403809e325750d3d263cd78929c2942b7942a34b77e122c9594a74c8c",
        "5dc9da79a70659a9ad559cb701ded9a2ab9d823aad2f4960cfe370eff4604328",
    ];

    fn ns() -> Namespace {
        Namespace::derive(&ObjectId::new("acct", "log"), ObjectKind::Log)
    }

    fn append_all(store: &MemoryStore, entries: &[Vec<u8>]) {
        for entry in entries {
            store
                .execute_update(&ns(), |kw| {
                    append_leaf(
                        kw,
                        TreeRole::Object,
                        Hash::leaf(entry),
                        entry,
                        DuplicatePolicy::ReturnExisting,
                    )
                    .map(|_| ())
                })
                .unwrap();
        }
    }

    #[test]
    fn test_empty_log_head() {
        let store = MemoryStore::new();
        let head = store
            .execute_read_only(&ns(), |kr| tree_hash(kr, TreeRole::Object, 0))
            .unwrap();
        assert_eq!(head, TreeHead::EMPTY);
    }

    #[test]
    fn test_single_append() {
        let store = MemoryStore::new();
        let outcome = store
            .execute_update(&ns(), |kw| {
                append_leaf(
                    kw,
                    TreeRole::Object,
                    Hash::leaf(b"hello"),
                    b"hello",
                    DuplicatePolicy::ReturnExisting,
                )
            })
            .unwrap();
        assert_eq!(outcome.index, 0);
        assert!(outcome.appended);
        assert_eq!(outcome.head.tree_size, 1);
        assert_eq!(outcome.head.root_hash, Hash::leaf(b"hello"));

        store
            .execute_read_only(&ns(), |kr| {
                assert_eq!(get_entry(kr, TreeRole::Object, 0)?, b"hello".to_vec());
                assert!(inclusion_proof(kr, TreeRole::Object, 0, 1)?.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_two_appends() {
        let store = MemoryStore::new();
        append_all(&store, &[b"a".to_vec(), b"b".to_vec()]);

        store
            .execute_read_only(&ns(), |kr| {
                let head = tree_hash(kr, TreeRole::Object, 2)?;
                assert_eq!(
                    head.root_hash,
                    Hash::node(&Hash::leaf(b"a"), &Hash::leaf(b"b"))
                );
                assert_eq!(
                    inclusion_proof(kr, TreeRole::Object, 0, 2)?,
                    vec![Hash::leaf(b"b")]
                );
                assert_eq!(
                    inclusion_proof(kr, TreeRole::Object, 1, 2)?,
                    vec![Hash::leaf(b"a")]
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_known_roots() {
        let store = MemoryStore::new();
        let leaves = test_leaves();
        for (i, entry) in leaves.iter().enumerate() {
            let outcome = store
                .execute_update(&ns(), |kw| {
                    append_leaf(
                        kw,
                        TreeRole::Object,
                        Hash::leaf(entry),
                        entry,
                        DuplicatePolicy::ReturnExisting,
                    )
                })
                .unwrap();
            assert_eq!(outcome.head.root_hash.to_hex(), KNOWN_ROOTS[i], "size {}", i + 1);
        }

        // Historical roots stay retrievable after later appends.
        store
            .execute_read_only(&ns(), |kr| {
                for (i, expected) in KNOWN_ROOTS.iter().enumerate() {
                    let head = tree_hash(kr, TreeRole::Object, (i + 1) as u64)?;
                    assert_eq!(head.root_hash.to_hex(), *expected, "size {}", i + 1);
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_duplicate_append_returns_existing() {
        let store = MemoryStore::new();
        append_all(&store, &[b"a".to_vec(), b"b".to_vec()]);

        let outcome = store
            .execute_update(&ns(), |kw| {
                append_leaf(
                    kw,
                    TreeRole::Object,
                    Hash::leaf(b"a"),
                    b"a",
                    DuplicatePolicy::ReturnExisting,
                )
            })
            .unwrap();
        assert!(!outcome.appended);
        assert_eq!(outcome.index, 0);
        assert_eq!(outcome.head.tree_size, 2);
    }

    #[test]
    fn test_append_always_grows_and_keeps_first_index() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            store
                .execute_update(&ns(), |kw| {
                    append_leaf(
                        kw,
                        TreeRole::Object,
                        Hash::leaf(b"dup"),
                        b"dup",
                        DuplicatePolicy::AppendAlways,
                    )
                    .map(|_| ())
                })
                .unwrap();
        }

        store
            .execute_read_only(&ns(), |kr| {
                assert_eq!(read_head(kr, TreeRole::Object)?.tree_size, 2);
                assert_eq!(
                    index_for_leaf(kr, TreeRole::Object, &Hash::leaf(b"dup"))?,
                    Some(0)
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_inclusion_proofs_verify_at_all_sizes() {
        let store = MemoryStore::new();
        append_all(&store, &test_leaves());
        let leaves = test_leaves();

        store
            .execute_read_only(&ns(), |kr| {
                for n in 1..=leaves.len() as u64 {
                    let head = tree_hash(kr, TreeRole::Object, n)?;
                    for i in 0..n {
                        let path = inclusion_proof(kr, TreeRole::Object, i, n)?;
                        let leaf = Hash::leaf(&leaves[i as usize]);
                        assert!(
                            verify_inclusion(&leaf, i, n, &path, &head.root_hash),
                            "inclusion ({i}, {n})"
                        );
                        // A wrong leaf must not verify.
                        assert!(!verify_inclusion(
                            &Hash::leaf(b"not the leaf"),
                            i,
                            n,
                            &path,
                            &head.root_hash
                        ));
                    }
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_consistency_proofs_verify_at_all_size_pairs() {
        let store = MemoryStore::new();
        append_all(&store, &test_leaves());

        store
            .execute_read_only(&ns(), |kr| {
                for a in 0..=8u64 {
                    for b in a..=8u64 {
                        let old = tree_hash(kr, TreeRole::Object, a)?;
                        let new = tree_hash(kr, TreeRole::Object, b)?;
                        // tree_hash(0) is the HEAD sentinel; pin the size.
                        let old = TreeHead {
                            tree_size: a,
                            root_hash: if a == 0 { Hash::ZERO } else { old.root_hash },
                        };
                        let path = consistency_proof(kr, TreeRole::Object, a, b)?;
                        assert!(verify_consistency(&old, &new, &path), "consistency ({a}, {b})");
                    }
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_consistency_rejects_wrong_old_root() {
        let store = MemoryStore::new();
        append_all(&store, &test_leaves());

        store
            .execute_read_only(&ns(), |kr| {
                let new = tree_hash(kr, TreeRole::Object, 5)?;
                let path = consistency_proof(kr, TreeRole::Object, 3, 5)?;
                let bogus = TreeHead {
                    tree_size: 3,
                    root_hash: Hash::leaf(b"bogus"),
                };
                assert!(!verify_consistency(&bogus, &new, &path));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_out_of_range() {
        let store = MemoryStore::new();
        append_all(&store, &[b"a".to_vec()]);

        store
            .execute_read_only(&ns(), |kr| {
                assert_eq!(
                    tree_hash(kr, TreeRole::Object, 2).unwrap_err(),
                    Error::InvalidTreeRange
                );
                assert_eq!(
                    inclusion_proof(kr, TreeRole::Object, 1, 1).unwrap_err(),
                    Error::InvalidTreeRange
                );
                assert_eq!(
                    consistency_proof(kr, TreeRole::Object, 1, 2).unwrap_err(),
                    Error::InvalidTreeRange
                );
                assert_eq!(
                    get_entry(kr, TreeRole::Object, 1).unwrap_err(),
                    Error::InvalidTreeRange
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_roles_are_independent_trees() {
        let store = MemoryStore::new();
        store
            .execute_update(&ns(), |kw| {
                append_leaf(
                    kw,
                    TreeRole::Object,
                    Hash::leaf(b"a"),
                    b"a",
                    DuplicatePolicy::ReturnExisting,
                )?;
                append_leaf(
                    kw,
                    TreeRole::MutationLog,
                    Hash::leaf(b"m"),
                    b"m",
                    DuplicatePolicy::AppendAlways,
                )?;
                Ok(())
            })
            .unwrap();

        store
            .execute_read_only(&ns(), |kr| {
                assert_eq!(read_head(kr, TreeRole::Object)?.tree_size, 1);
                assert_eq!(read_head(kr, TreeRole::MutationLog)?.tree_size, 1);
                assert_eq!(read_head(kr, TreeRole::TreeHeadLog)?.tree_size, 0);
                assert_eq!(get_entry(kr, TreeRole::MutationLog, 0)?, b"m".to_vec());
                Ok(())
            })
            .unwrap();
    }
}
