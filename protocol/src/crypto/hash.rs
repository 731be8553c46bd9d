//! # Hashing Utilities
//!
//! The Hub hashes with exactly one function: BLAKE3, truncated to 160 bits.
//! Message hashes, trie leaf digests, trie internal digests and excluded
//! hashes all use it, so peers only need to agree on one primitive.
//!
//! BLAKE3 output is an extendable stream, so a 20-byte digest is the prefix
//! of the regular 32-byte one. Truncating `blake3::hash` and asking the XOF
//! for 20 bytes give the same answer.

use crate::config::HASH_LENGTH;

/// A 160-bit BLAKE3 digest.
pub type Hash160 = [u8; HASH_LENGTH];

/// Compute BLAKE3 over `data`, truncated to 160 bits.
///
/// # Example
///
/// ```
/// use hub_protocol::crypto::blake3_160;
///
/// let digest = blake3_160(b"hub");
/// assert_eq!(digest.len(), 20);
/// ```
pub fn blake3_160(data: &[u8]) -> Hash160 {
    truncate(blake3::hash(data))
}

/// Hash several slices in order without concatenating them first.
///
/// Trie nodes use this to hash their children's digests in character order.
pub fn blake3_160_multi<'a, I>(parts: I) -> Hash160
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    truncate(hasher.finalize())
}

/// Digest of the empty input. Used for empty trie nodes and for excluded
/// hashes with no siblings.
pub fn empty_hash() -> Hash160 {
    blake3_160(&[])
}

fn truncate(digest: blake3::Hash) -> Hash160 {
    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(&digest.as_bytes()[..HASH_LENGTH]);
    out
}
