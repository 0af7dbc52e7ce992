use blake2::digest::consts::{U32, U5, U8};
use blake2::{Blake2b, Digest};

use crate::shared::types::BlockHash;

type Blake2b256 = Blake2b<U32>;
type Blake2b64 = Blake2b<U8>;
type Blake2b40 = Blake2b<U5>;

/// blake2b with a 32 byte digest over the concatenation of `parts`
pub fn blake2b_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Difficulty value of `work` against `root`: blake2b-64 of the
/// little-endian work followed by the root, read little-endian.
pub fn work_value(work: u64, root: &BlockHash) -> u64 {
    let mut hasher = Blake2b64::new();
    hasher.update(work.to_le_bytes());
    hasher.update(root.as_bytes());
    let mut digest = [0u8; 8];
    digest.copy_from_slice(&hasher.finalize());
    u64::from_le_bytes(digest)
}

/// 5 byte checksum appended to encoded addresses (byte order reversed)
pub fn address_checksum(public_key: &[u8; 32]) -> [u8; 5] {
    let mut hasher = Blake2b40::new();
    hasher.update(public_key);
    let mut digest = [0u8; 5];
    digest.copy_from_slice(&hasher.finalize());
    digest.reverse();
    digest
}
