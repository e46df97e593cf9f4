//! Precomputed hashes of empty map subtrees.

use crate::Hash;
use std::sync::OnceLock;

/// Depth of the sparse map tree (one level per key-hash bit).
pub const MAP_DEPTH: usize = 256;

static EMPTY: OnceLock<Vec<Hash>> = OnceLock::new();

/// Hash of an empty subtree rooted at `depth`.
///
/// `empty_subtree(MAP_DEPTH)` is the unset leaf `Hash::leaf(&[])`; each
/// level above is the node hash of two copies of the level below, so
/// `empty_subtree(0)` is the root of a map with no keys set. The table is
/// computed once and read-only thereafter.
pub fn empty_subtree(depth: usize) -> Hash {
    debug_assert!(depth <= MAP_DEPTH);
    let table = EMPTY.get_or_init(|| {
        let mut table = vec![Hash::ZERO; MAP_DEPTH + 1];
        table[MAP_DEPTH] = Hash::leaf(&[]);
        for depth in (0..MAP_DEPTH).rev() {
            let child = table[depth + 1];
            table[depth] = Hash::node(&child, &child);
        }
        table
    });
    table[depth]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_level_is_empty_leaf() {
        assert_eq!(empty_subtree(MAP_DEPTH), Hash::leaf(&[]));
    }

    #[test]
    fn test_each_level_combines_children() {
        for depth in 0..MAP_DEPTH {
            let child = empty_subtree(depth + 1);
            assert_eq!(empty_subtree(depth), Hash::node(&child, &child));
        }
    }

    #[test]
    fn test_levels_are_distinct() {
        assert_ne!(empty_subtree(0), empty_subtree(1));
        assert_ne!(empty_subtree(255), empty_subtree(256));
    }
}
