//! LaneHash - fast two-lane 64-bit hash with a statistical validation harness
//! **WARNING: NOT CRYPTOGRAPHICALLY SECURE**
//!
//! Meant for hash tables, checksums and deduplication keys over non-adversarial input.
//! The harness modules measure how well the function mixes instead of assuming it.

use std::hash::{BuildHasher, Hasher};

pub mod avalanche;
pub mod correlation;
pub mod distinct;
pub mod error;
pub mod throughput;

pub use error::{Error, Result};

/// Multiplier and seed of lane A.
pub const K1: u64 = 0x1591aefa5e7e5a17;
/// Multiplier and seed of lane B.
pub const K2: u64 = 0x2bb6863566c4e761;

/// Bytes consumed per mixing step, one 8-byte word per lane.
pub const BLOCK_SIZE: usize = 16;

#[inline(always)]
fn read_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

#[inline(always)]
fn read_u32(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word) as u64
}

#[inline(always)]
fn read_u16(bytes: &[u8]) -> u64 {
    u16::from_le_bytes([bytes[0], bytes[1]]) as u64
}

/// One finalization round: widening multiply of lane A, high half carried into lane B.
#[inline(always)]
fn fold(a: u64, b: u64) -> (u64, u64) {
    let product = (a as u128) * (K1 as u128);
    let lo = product as u64;
    let hi = (product >> 64) as u64;
    let b = b.wrapping_mul(K2).wrapping_add(hi);
    (lo ^ b, b)
}

/// Hash a byte buffer to a 64-bit digest.
///
/// Pure and allocation free: the digest depends only on the bytes and their count.
/// Words are read little-endian on every target, so digests are portable.
///
/// ```
/// let a = lanehash::hash(b"abc");
/// assert_eq!(a, lanehash::hash(b"abc"));
/// assert_ne!(a, lanehash::hash(b"abcd"));
/// ```
pub fn hash(data: &[u8]) -> u64 {
    // Length goes into the seed so shared prefixes of different lengths diverge.
    let mut a = K1 ^ data.len() as u64;
    let mut b = K2;

    let mut blocks = data.chunks_exact(BLOCK_SIZE);
    for block in &mut blocks {
        a = ((a ^ read_u64(&block[..8])).wrapping_mul(K1)).swap_bytes();
        b = ((b ^ read_u64(&block[8..])).wrapping_mul(K2)).swap_bytes();
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let len = tail.len();
        let mut rest = tail;
        let mut t = 0u64;

        if len & 8 != 0 {
            a ^= read_u64(rest);
            rest = &rest[8..];
        }
        if len & 4 != 0 {
            t = read_u32(rest);
            rest = &rest[4..];
        }
        if len & 2 != 0 {
            t = (t << 16) | read_u16(rest);
            rest = &rest[2..];
        }
        if len & 1 != 0 {
            t = (t << 8) | rest[0] as u64;
        }
        b ^= t;
    }

    let (a, b) = fold(a, b);
    let (a, _) = fold(a, b);

    (a >> 32) ^ a
}

/// [`Hasher`] adapter for keying std collections.
///
/// The seed depends on the total length, so written bytes are buffered and digested
/// in one pass by [`finish`](Hasher::finish). `finish` on a given byte sequence always
/// equals [`hash`] of the concatenated writes.
///
/// The buffer is a `Vec<u8>`, so hashing a key costs one heap allocation. Prefer
/// [`hash`] directly when the whole key is already in one slice.
#[derive(Clone, Debug, Default)]
pub struct LaneHasher {
    buffer: Vec<u8>,
}

impl LaneHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Hasher for LaneHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    #[inline]
    fn finish(&self) -> u64 {
        hash(&self.buffer)
    }
}

/// Builds [`LaneHasher`]s, e.g. `HashMap<K, V, LaneBuildHasher>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LaneBuildHasher;

impl BuildHasher for LaneBuildHasher {
    type Hasher = LaneHasher;

    fn build_hasher(&self) -> LaneHasher {
        LaneHasher::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_known_vectors() {
        assert_eq!(hash(b""), 0x3d6a918b3fac181a);
        assert_eq!(hash(b"a"), 0x3e58067d091a53d0);
        assert_eq!(hash(b"abc"), 0xe5fc8abb1cab0227);
        assert_eq!(hash(b"hello world"), 0x953def7887f400f6);
        assert_eq!(hash(&[0u8; 16]), 0x0bf548c67ac18923);
        assert_eq!(
            hash(b"The quick brown fox jumps over the lazy dog"),
            0x6e95c6e160829276
        );

        let counting: Vec<u8> = (0..32).collect();
        assert_eq!(hash(&counting), 0x0be5e3c501f6e8ea);
    }

    #[test]
    fn test_deterministic() {
        let data = b"Hello, LaneHash!";
        assert_eq!(hash(data), hash(data));
    }

    #[test]
    fn test_length_folded_into_seed() {
        let zeros = [0u8; 40];
        let mut seen = Vec::new();
        for len in 0..zeros.len() {
            let h = hash(&zeros[..len]);
            assert!(!seen.contains(&h), "zero prefix of {} bytes collided", len);
            seen.push(h);
        }
    }

    #[test]
    fn test_empty_input() {
        let empty = hash(&[]);
        assert_ne!(empty, 0);
        for byte in 0..=255u8 {
            assert_ne!(empty, hash(&[byte]));
        }
    }

    #[test]
    fn test_short_tails_are_zero_seeded() {
        // Lengths 1..=3 never touch the 4-byte branch; the scratch word must start at zero
        // so the same bytes always give the same digest.
        for len in 1..=3 {
            let data = vec![0xA5u8; len];
            assert_eq!(hash(&data), hash(&data.clone()));
        }
        assert_ne!(hash(&[1]), hash(&[1, 0]));
        assert_ne!(hash(&[0, 1]), hash(&[1, 0]));
    }

    #[test]
    fn test_unaligned_input() {
        let backing: Vec<u8> = (0..64u8).collect();
        let copy = backing[1..40].to_vec();
        assert_eq!(hash(&backing[1..40]), hash(&copy));
    }

    #[test]
    fn test_hasher_matches_oneshot() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut hasher = LaneHasher::new();
        hasher.write(&data[..10]);
        hasher.write(&data[10..20]);
        hasher.write(&data[20..]);
        assert_eq!(hasher.finish(), hash(data));
    }

    #[test]
    fn test_hasher_buffers_every_write() {
        let mut hasher = LaneHasher::new();
        assert_eq!(hasher.finish(), hash(b""));

        hasher.write(b"ab");
        assert_eq!(hasher.finish(), hash(b"ab"));
        hasher.write(b"c");
        assert_eq!(hasher.finish(), hash(b"abc"));
    }

    #[test]
    fn test_build_hasher_keys_a_map() {
        let mut map: HashMap<&str, u32, LaneBuildHasher> = HashMap::default();
        map.insert("alpha", 1);
        map.insert("beta", 2);
        assert_eq!(map.get("alpha"), Some(&1));
        assert_eq!(map.get("beta"), Some(&2));
        assert_eq!(map.get("gamma"), None);
    }
}
