//! Avalanche test: every input bit must be able to flip every output bit.
//!
//! For each key length, byte and bit, pairs of keys differing in exactly that bit are
//! hashed until every output bit has been seen both flipped and unflipped, and both
//! digests have shown every output bit as one and as zero.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct AvalancheConfig {
    /// Key lengths `0..max_len` are probed.
    pub max_len: usize,
    /// Rotating pair counter bound; `k` runs `0, 2, .., max_pairs - 2`.
    pub max_pairs: usize,
}

impl Default for AvalancheConfig {
    fn default() -> Self {
        Self {
            max_len: 100,
            max_pairs: 80,
        }
    }
}

impl AvalancheConfig {
    /// Pairs a single position may use before it is declared stuck.
    pub fn trial_limit(&self) -> usize {
        (self.max_pairs + 1) / 2
    }
}

/// Output bits whose behaviour has not varied yet. A position passes once all are empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Masks {
    pub always_flipped: u64,
    pub never_flipped: u64,
    pub first_always_one: u64,
    pub first_always_zero: u64,
    pub second_always_one: u64,
    pub second_always_zero: u64,
}

impl Masks {
    fn new() -> Self {
        Self {
            always_flipped: !0,
            never_flipped: !0,
            first_always_one: !0,
            first_always_zero: !0,
            second_always_one: !0,
            second_always_zero: !0,
        }
    }

    #[inline]
    fn observe(&mut self, first: u64, second: u64) {
        let delta = first ^ second;
        self.always_flipped &= delta;
        self.never_flipped &= !delta;
        self.first_always_one &= first;
        self.first_always_zero &= !first;
        self.second_always_one &= second;
        self.second_always_zero &= !second;
    }

    pub fn settled(&self) -> bool {
        (self.always_flipped
            | self.never_flipped
            | self.first_always_one
            | self.first_always_zero
            | self.second_always_one
            | self.second_always_zero)
            == 0
    }
}

impl fmt::Display for Masks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016x} {:016x} {:016x} {:016x} {:016x} {:016x}",
            self.always_flipped,
            self.never_flipped,
            self.first_always_one,
            self.first_always_zero,
            self.second_always_one,
            self.second_always_zero
        )
    }
}

/// Result of probing one input bit position.
#[derive(Clone, Debug)]
pub struct PositionOutcome {
    pub len: usize,
    pub byte: usize,
    pub bit: u32,
    /// Key pairs hashed before every mask emptied, or the limit if they never did.
    pub trials: usize,
    /// Outstanding masks when the limit was hit.
    pub residue: Option<Masks>,
}

/// Probe a single input bit of a `len`-byte key.
///
/// Pair `k` puts `k` rotated left by `bit` into byte `byte` of the first key and `k + 1`
/// rotated the same way into the second, every other byte zero, so the keys differ in
/// exactly that bit. The second key sits one byte into its buffer to exercise unaligned
/// reads.
pub fn probe_position<H>(
    hash_fn: &H,
    len: usize,
    byte: usize,
    bit: u32,
    max_pairs: usize,
) -> Result<PositionOutcome>
where
    H: Fn(&[u8]) -> u64,
{
    if byte >= len || bit >= 8 {
        return Err(Error::PositionOutOfRange { len, byte, bit });
    }

    let mut first = vec![0u8; len + 1];
    let mut second = vec![0u8; len + 2];
    let mut masks = Masks::new();
    let mut trials = 0;

    for k in (0..max_pairs).step_by(2) {
        first.fill(0);
        second.fill(0);
        first[byte] = (k as u8).rotate_left(bit);
        second[1 + byte] = ((k + 1) as u8).rotate_left(bit);

        let c = hash_fn(&first[..len]);
        let d = hash_fn(&second[1..1 + len]);
        masks.observe(c, d);
        trials += 1;

        if masks.settled() {
            return Ok(PositionOutcome {
                len,
                byte,
                bit,
                trials,
                residue: None,
            });
        }
    }

    Ok(PositionOutcome {
        len,
        byte,
        bit,
        trials,
        residue: Some(masks),
    })
}

/// A bit position whose influence never reached some output bit.
#[derive(Clone, Debug)]
pub struct Anomaly {
    pub len: usize,
    pub byte: usize,
    pub bit: u32,
    pub residue: Masks,
}

#[derive(Clone, Debug)]
pub struct LengthSummary {
    pub len: usize,
    /// Worst pair count over the probed positions of this length.
    pub trials: usize,
    /// Probing of this length stopped at a stuck position.
    pub saturated: bool,
}

#[derive(Clone, Debug)]
pub struct AvalancheReport {
    pub limit: usize,
    pub lengths: Vec<LengthSummary>,
    pub anomalies: Vec<Anomaly>,
    /// Headline statistic: most pairs any position needed.
    pub max_trials: usize,
}

impl AvalancheReport {
    pub fn passed(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Run the avalanche test over every key length in the configuration.
///
/// A length stops being probed at its first stuck position.
pub fn run_avalanche<H>(hash_fn: H, config: &AvalancheConfig) -> Result<AvalancheReport>
where
    H: Fn(&[u8]) -> u64,
{
    if config.max_pairs == 0 {
        return Err(Error::NoTrials);
    }

    let mut lengths = Vec::with_capacity(config.max_len);
    let mut anomalies = Vec::new();

    for len in 0..config.max_len {
        let mut worst = 0;
        let mut saturated = false;

        'positions: for byte in 0..len {
            for bit in 0..8 {
                let outcome = probe_position(&hash_fn, len, byte, bit, config.max_pairs)?;
                worst = worst.max(outcome.trials);

                if let Some(residue) = outcome.residue {
                    warn!(len, byte, bit, masks = %residue, "some bit didn't change");
                    anomalies.push(Anomaly {
                        len,
                        byte,
                        bit,
                        residue,
                    });
                    saturated = true;
                    break 'positions;
                }
            }
        }

        debug!(len, trials = worst, saturated, "avalanche length done");
        lengths.push(LengthSummary {
            len,
            trials: worst,
            saturated,
        });
    }

    let max_trials = lengths.iter().map(|l| l.trials).max().unwrap_or(0);
    info!(
        max_trials,
        anomalies = anomalies.len(),
        "avalanche test finished"
    );

    Ok(AvalancheReport {
        limit: config.trial_limit(),
        lengths,
        anomalies,
        max_trials,
    })
}

impl fmt::Display for AvalancheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "No more than {} trials should ever be needed", self.limit)?;
        for a in &self.anomalies {
            writeln!(
                f,
                "Some bit didn't change: {}  i {} j {} len {}",
                a.residue, a.byte, a.bit, a.len
            )?;
        }
        for l in self.lengths.iter().filter(|l| !l.saturated) {
            writeln!(f, "Mix success  {:2} bytes required  {}  trials", l.len, l.trials)?;
        }
        writeln!(f, "Most trials needed: {}", self.max_trials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;

    #[test]
    fn test_real_hash_avalanches() {
        let config = AvalancheConfig::default();
        let report = run_avalanche(hash, &config).unwrap();

        assert_eq!(report.lengths.len(), 100);
        assert!(report.passed(), "{}", report);
        assert!(report.max_trials >= 1);
        assert!(report.max_trials <= 40, "{}", report.max_trials);
        // Nothing to flip in an empty key.
        assert_eq!(report.lengths[0].trials, 0);
    }

    #[test]
    fn test_middle_bit_of_short_key() {
        let outcome = probe_position(&hash, 5, 2, 3, 80).unwrap();
        assert!(outcome.residue.is_none());
        assert!(outcome.trials >= 1 && outcome.trials <= 40);

        // The very first pair already differs in the output.
        let mut flipped = [0u8; 5];
        flipped[2] = 1 << 3;
        assert_ne!(hash(&[0u8; 5]), hash(&flipped));
    }

    #[test]
    fn test_constant_hash_never_changes() {
        let config = AvalancheConfig {
            max_len: 4,
            max_pairs: 80,
        };
        let report = run_avalanche(|_: &[u8]| 0u64, &config).unwrap();

        assert!(!report.passed());
        // One stuck position per non-empty length, then that length is abandoned.
        assert_eq!(report.anomalies.len(), 3);
        assert_eq!(report.max_trials, 40);

        let first = &report.anomalies[0];
        assert_eq!((first.len, first.byte, first.bit), (1, 0, 0));
        assert_eq!(first.residue.always_flipped, 0);
        assert_eq!(first.residue.never_flipped, !0);
        assert_eq!(first.residue.first_always_one, 0);
        assert_eq!(first.residue.first_always_zero, !0);
    }

    #[test]
    fn test_ignored_byte_is_reported() {
        let skip_first = |data: &[u8]| match data.split_first() {
            Some((_, rest)) => hash(rest),
            None => hash(data),
        };
        let config = AvalancheConfig {
            max_len: 6,
            max_pairs: 80,
        };
        let report = run_avalanche(skip_first, &config).unwrap();

        assert_eq!(report.anomalies.len(), 5);
        assert!(report.anomalies.iter().all(|a| a.byte == 0 && a.bit == 0));
        assert!(report.lengths[1..].iter().all(|l| l.saturated));
        assert!(report.anomalies.iter().all(|a| a.residue.never_flipped == !0));
    }

    #[test]
    fn test_position_outside_key_is_rejected() {
        assert!(matches!(
            probe_position(&hash, 4, 4, 0, 80),
            Err(Error::PositionOutOfRange {
                len: 4,
                byte: 4,
                bit: 0
            })
        ));
        assert!(matches!(
            probe_position(&hash, 4, 1, 8, 80),
            Err(Error::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            probe_position(&hash, 0, 0, 0, 80),
            Err(Error::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_pairs_is_rejected() {
        let config = AvalancheConfig {
            max_len: 4,
            max_pairs: 0,
        };
        assert!(matches!(run_avalanche(hash, &config), Err(Error::NoTrials)));
    }
}
