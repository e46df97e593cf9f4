//! Cryptographic hash type using SHA-256 with RFC 6962 domain separation.

use sbor::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain prefix for leaf hashes.
const LEAF_PREFIX: u8 = 0x00;
/// Domain prefix for interior node hashes.
const NODE_PREFIX: u8 = 0x01;

/// A 32-byte cryptographic hash using SHA-256.
///
/// Leaf and node constructors apply the RFC 6962 domain-separation prefixes
/// so that a leaf input can never collide with an interior node input.
/// All hashing operations are deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Size of hash in bytes.
    pub const BYTES: usize = 32;

    /// Zero hash (all bytes are 0x00). Also the root of an empty log.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash arbitrary bytes without a domain prefix.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Create a Hash from raw hash bytes (without hashing).
    ///
    /// # Panics
    ///
    /// Panics if bytes length is not exactly 32.
    pub fn from_hash_bytes(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), 32, "Hash must be exactly 32 bytes");
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Self(arr)
    }

    /// RFC 6962 leaf hash: `SHA256(0x00 || data)`.
    pub fn leaf(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// RFC 6962 node hash: `SHA256(0x01 || left || right)`.
    pub fn node(left: &Hash, right: &Hash) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([NODE_PREFIX]);
        hasher.update(left.0);
        hasher.update(right.0);
        Self(hasher.finalize().into())
    }

    /// Map leaf hash: `SHA256(0x00 || key_hash || value)`.
    ///
    /// Binds the key hash into the leaf so an inclusion proof for one key
    /// cannot be replayed for another. The unset-key leaf is `Hash::leaf(&[])`
    /// with no key hash bound, see [`empty_subtree`](crate::empty_subtree).
    pub fn map_leaf(key_hash: &Hash, value: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(key_hash.0);
        hasher.update(value);
        Self(hasher.finalize().into())
    }

    /// Parse hash from hex string.
    pub fn from_hex(hex: &str) -> Result<Self, HexError> {
        if hex.len() != 64 {
            return Err(HexError::InvalidLength {
                expected: 64,
                actual: hex.len(),
            });
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex, &mut bytes).map_err(|_| HexError::InvalidHex)?;

        Ok(Self(bytes))
    }

    /// Convert hash to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get bytes as slice reference.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to bytes array.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The bit at `position`, counting from the most significant bit.
    ///
    /// Map key paths descend the prefix tree MSB-first, so position 0
    /// selects the root's child.
    pub fn bit(&self, position: usize) -> bool {
        debug_assert!(position < 256);
        let byte_index = position / 8;
        let bit_index = 7 - (position % 8);
        (self.0[byte_index] >> bit_index) & 1 == 1
    }

    /// Copy of this hash with all bits past the first `bits` cleared.
    ///
    /// Used to address map nodes by path prefix: the node at depth d is
    /// keyed by the first d bits of the key hash.
    pub fn prefix(&self, bits: usize) -> Hash {
        debug_assert!(bits <= 256);
        let mut out = self.0;
        let full_bytes = bits / 8;
        let rem_bits = bits % 8;
        if rem_bits != 0 {
            out[full_bytes] &= 0xFFu8 << (8 - rem_bits);
        }
        for byte in out.iter_mut().skip(full_bytes + usize::from(rem_bits != 0)) {
            *byte = 0;
        }
        out.into()
    }

    /// Copy of this hash with the bit at `position` (MSB-first) flipped.
    pub fn flip_bit(&self, position: usize) -> Hash {
        debug_assert!(position < 256);
        let mut out = self.0;
        out[position / 8] ^= 1 << (7 - (position % 8));
        out.into()
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Hash({}..{})", &hex[..8], &hex[56..])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Errors that can occur when parsing hex strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// Invalid hex string length.
    #[error("Invalid hex length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Invalid hex characters.
    #[error("Invalid hex string")]
    InvalidHex,
}
