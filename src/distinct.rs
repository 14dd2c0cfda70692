//! Distinctness smoke test for short keys built from nulls and repeated bytes.

use std::collections::HashMap;
use std::fmt;

use tracing::{info, warn};

/// Longest key in the smoke test, exclusive.
const SHORT_LEN: usize = 8;
/// Fill byte of the repeated-byte groups.
const FILL: u8 = 42;

/// Which family of short keys a sample came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Group {
    /// All-zero keys of length 0..8.
    Zeros,
    /// All-42 keys of length 1..8.
    Repeated,
    /// 42 keys with byte `i` bumped by `i`, length 1..8.
    Stepped,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Zeros => f.write_str("0-byte"),
            Group::Repeated => f.write_str("42-byte"),
            Group::Stepped => f.write_str("42+-byte"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sample {
    pub group: Group,
    pub key: Vec<u8>,
    pub digest: u64,
}

/// Two different keys that produced the same digest.
#[derive(Clone, Debug)]
pub struct Collision {
    pub first: Vec<u8>,
    pub second: Vec<u8>,
    pub digest: u64,
}

#[derive(Clone, Debug)]
pub struct DistinctnessReport {
    pub samples: Vec<Sample>,
    pub collisions: Vec<Collision>,
}

impl DistinctnessReport {
    pub fn passed(&self) -> bool {
        self.collisions.is_empty()
    }
}

fn short_keys() -> Vec<(Group, Vec<u8>)> {
    let mut keys = Vec::new();

    let zeros = [0u8; SHORT_LEN];
    for len in 0..SHORT_LEN {
        keys.push((Group::Zeros, zeros[..len].to_vec()));
    }

    let mut buf = [FILL; SHORT_LEN];
    for len in 1..SHORT_LEN {
        keys.push((Group::Repeated, buf[..len].to_vec()));
    }

    for (i, byte) in buf.iter_mut().enumerate().skip(1) {
        *byte = byte.wrapping_add(i as u8);
    }
    for len in 1..SHORT_LEN {
        keys.push((Group::Stepped, buf[..len].to_vec()));
    }

    keys
}

/// Hash every short key and check that distinct keys got distinct digests.
///
/// The same bytes can appear in two groups (the one-byte 42 key does); those share a
/// digest legitimately and are not reported.
pub fn run_distinctness<H>(hash_fn: H) -> DistinctnessReport
where
    H: Fn(&[u8]) -> u64,
{
    let samples: Vec<Sample> = short_keys()
        .into_iter()
        .map(|(group, key)| {
            let digest = hash_fn(&key);
            Sample { group, key, digest }
        })
        .collect();

    let mut owners: HashMap<u64, &[u8]> = HashMap::new();
    let mut collisions = Vec::new();
    for sample in &samples {
        match owners.get(&sample.digest) {
            Some(owner) if *owner != sample.key.as_slice() => {
                warn!(
                    digest = sample.digest,
                    first = ?owner,
                    second = ?sample.key,
                    "distinct keys share a digest"
                );
                collisions.push(Collision {
                    first: owner.to_vec(),
                    second: sample.key.clone(),
                    digest: sample.digest,
                });
            }
            Some(_) => {}
            None => {
                owners.insert(sample.digest, &sample.key);
            }
        }
    }

    info!(
        samples = samples.len(),
        collisions = collisions.len(),
        "distinctness test finished"
    );
    DistinctnessReport {
        samples,
        collisions,
    }
}

impl fmt::Display for DistinctnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut group = None;
        for sample in &self.samples {
            if group != Some(sample.group) {
                writeln!(f, "These should all be different")?;
                group = Some(sample.group);
            }
            writeln!(
                f,
                "{}  {} strings, hash is {:016x}",
                sample.key.len(),
                sample.group,
                sample.digest
            )?;
        }
        for c in &self.collisions {
            writeln!(
                f,
                "Collision {:016x}: {:02x?} vs {:02x?}",
                c.digest, c.first, c.second
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;

    #[test]
    fn test_short_key_groups() {
        let keys = short_keys();
        assert_eq!(keys.len(), 8 + 7 + 7);
        assert_eq!(keys[0], (Group::Zeros, vec![]));
        assert_eq!(keys[8], (Group::Repeated, vec![42]));
        assert_eq!(keys[21], (Group::Stepped, vec![42, 43, 44, 45, 46, 47, 48]));
    }

    #[test]
    fn test_real_hash_is_distinct() {
        let report = run_distinctness(hash);
        assert_eq!(report.samples.len(), 22);
        assert!(report.passed(), "{}", report);
    }

    #[test]
    fn test_duplicate_key_is_not_a_collision() {
        let report = run_distinctness(hash);
        let ones: Vec<_> = report
            .samples
            .iter()
            .filter(|s| s.key == [42])
            .collect();
        assert_eq!(ones.len(), 2);
        assert_eq!(ones[0].digest, ones[1].digest);
    }

    #[test]
    fn test_length_only_hash_collides() {
        let report = run_distinctness(|data: &[u8]| data.len() as u64);
        assert!(!report.passed());
        // Both 42 groups collide with the zero key of the same length.
        assert_eq!(report.collisions.len(), 7 + 7);
    }
}
