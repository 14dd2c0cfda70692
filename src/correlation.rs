//! Bit-correlation tests between single input-bit flips and output bits.
//!
//! Each trial hashes a random key, then every single-bit mutation of it, and tallies the
//! digest delta into a table of counters. [`FirstOrder`] keeps one counter per
//! (input bit, output bit) and counts output flips. [`SecondOrder`] keeps one counter per
//! (input bit, output bit pair) and counts pairs whose deltas differ. A balanced hash
//! hits every counter about half the time.

use std::fmt;

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hash;

const OUTPUT_BITS: usize = 64;
/// 64 choose 2.
const OUTPUT_PAIRS: usize = OUTPUT_BITS * (OUTPUT_BITS - 1) / 2;
const PROGRESS_EVERY: u64 = 100_000;

/// The output cell a counter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputCell {
    Bit(u32),
    Pair(u32, u32),
}

impl fmt::Display for OutputCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputCell::Bit(j) => write!(f, "{}", j),
            OutputCell::Pair(j, l) => write!(f, "{} {}", j, l),
        }
    }
}

/// What one correlation test counts per input bit.
pub trait Correlation {
    const NAME: &'static str;
    /// Counters per flipped input bit.
    const CELLS: usize;
    /// Tolerance multiplier, see [`tolerance`].
    const SIGMA: f64;

    /// Add the digest delta of one mutation into that input bit's counters.
    fn tally(delta: u64, cells: &mut [u64]);

    /// Output cell of counter `index` within one input bit's row.
    fn cell(index: usize) -> OutputCell;
}

/// Does flipping the input bit flip output bit `j`?
pub struct FirstOrder;

impl Correlation for FirstOrder {
    const NAME: &'static str = "first-order";
    const CELLS: usize = OUTPUT_BITS;
    const SIGMA: f64 = 4.0;

    #[inline]
    fn tally(delta: u64, cells: &mut [u64]) {
        for (j, cell) in cells.iter_mut().enumerate() {
            *cell += (delta >> j) & 1;
        }
    }

    fn cell(index: usize) -> OutputCell {
        OutputCell::Bit(index as u32)
    }
}

/// Does flipping the input bit flip exactly one of output bits `j < l`?
///
/// Pairs are packed row by row: `(0,1) .. (0,63), (1,2) .. (62,63)`.
pub struct SecondOrder;

impl Correlation for SecondOrder {
    const NAME: &'static str = "second-order";
    const CELLS: usize = OUTPUT_PAIRS;
    const SIGMA: f64 = 3.0;

    #[inline]
    fn tally(delta: u64, cells: &mut [u64]) {
        let mut index = 0;
        for j in 0..OUTPUT_BITS {
            let bit = delta >> j;
            for l in 1..OUTPUT_BITS - j {
                cells[index] += (bit ^ (bit >> l)) & 1;
                index += 1;
            }
        }
    }

    fn cell(mut index: usize) -> OutputCell {
        let mut j = 0;
        let mut row = OUTPUT_BITS - 1;
        while index >= row {
            index -= row;
            j += 1;
            row -= 1;
        }
        OutputCell::Pair(j as u32, (j + 1 + index) as u32)
    }
}

/// Allowed deviation from 50%, in percentage points, for `trials` trials.
pub fn tolerance(sigma: f64, trials: u64) -> f64 {
    sigma * OUTPUT_BITS as f64 / (trials as f64).sqrt()
}

#[derive(Clone, Debug)]
pub struct CorrelationConfig {
    pub trials: u64,
    /// Random key length in bytes; every one of its bits is flipped per trial.
    pub key_size: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            trials: 1_000_000,
            key_size: 32,
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.key_size == 0 {
            return Err(Error::EmptyKey);
        }
        if self.trials == 0 {
            return Err(Error::NoTrials);
        }
        Ok(())
    }
}

/// A counter whose rate fell outside the tolerance.
#[derive(Clone, Debug)]
pub struct CellAnomaly {
    pub input_bit: usize,
    pub output: OutputCell,
    /// Observed rate in percent.
    pub rate: f64,
}

#[derive(Clone, Debug)]
pub struct CorrelationReport {
    pub name: &'static str,
    pub trials: u64,
    pub cells: usize,
    /// Highest rate seen, never below 50.
    pub max: f64,
    /// Lowest rate seen, never above 50.
    pub min: f64,
    /// Mean squared deviation from 50, in squared percentage points.
    pub variance: f64,
    pub tolerance: f64,
    pub anomalies: Vec<CellAnomaly>,
}

impl CorrelationReport {
    pub fn passed(&self) -> bool {
        self.anomalies.is_empty()
    }
}

#[inline]
fn flip_bit(key: &mut [u8], bit: usize) {
    key[bit / 8] ^= 1 << (bit & 7);
}

/// Run a correlation test of kind `C` with keys drawn from `rng`.
///
/// A seeded `rng` makes the whole report reproducible.
pub fn run_correlation<C, H, R>(
    hash_fn: H,
    config: &CorrelationConfig,
    rng: &mut R,
) -> Result<CorrelationReport>
where
    C: Correlation,
    H: Fn(&[u8]) -> u64,
    R: RngCore + ?Sized,
{
    config.validate()?;

    let mut table = vec![0u64; config.key_size * 8 * C::CELLS];
    let mut key = vec![0u8; config.key_size];
    let mut mutated = vec![0u8; config.key_size];

    for trial in 0..config.trials {
        if trial > 0 && trial % PROGRESS_EVERY == 0 {
            debug!(test = C::NAME, trial, "correlation progress");
        }

        rng.fill_bytes(&mut key);
        let base = hash_fn(&key);

        for (bit, row) in table.chunks_exact_mut(C::CELLS).enumerate() {
            mutated.copy_from_slice(&key);
            flip_bit(&mut mutated, bit);
            C::tally(hash_fn(&mutated) ^ base, row);
        }
    }

    Ok(summarize::<C>(&table, config.trials))
}

fn summarize<C: Correlation>(table: &[u64], trials: u64) -> CorrelationReport {
    let limit = tolerance(C::SIGMA, trials);
    let mut max = 50.0f64;
    let mut min = 50.0f64;
    let mut ssq = 0.0;
    let mut anomalies = Vec::new();

    for (input_bit, row) in table.chunks_exact(C::CELLS).enumerate() {
        for (index, &count) in row.iter().enumerate() {
            let rate = count as f64 * 100.0 / trials as f64;
            max = max.max(rate);
            min = min.min(rate);

            let deviation = rate - 50.0;
            if deviation.abs() > limit {
                let output = C::cell(index);
                warn!(test = C::NAME, rate, input_bit, %output, "bad value");
                anomalies.push(CellAnomaly {
                    input_bit,
                    output,
                    rate,
                });
            }
            ssq += deviation * deviation;
        }
    }

    let variance = ssq / table.len() as f64;
    info!(
        test = C::NAME,
        max,
        min,
        variance,
        tolerance = limit,
        anomalies = anomalies.len(),
        "correlation test finished"
    );

    CorrelationReport {
        name: C::NAME,
        trials,
        cells: table.len(),
        max,
        min,
        variance,
        tolerance: limit,
        anomalies,
    }
}

/// First-order correlation of [`hash`].
pub fn first_order<R>(config: &CorrelationConfig, rng: &mut R) -> Result<CorrelationReport>
where
    R: RngCore + ?Sized,
{
    run_correlation::<FirstOrder, _, _>(hash, config, rng)
}

/// Second-order correlation of [`hash`].
pub fn second_order<R>(config: &CorrelationConfig, rng: &mut R) -> Result<CorrelationReport>
where
    R: RngCore + ?Sized,
{
    run_correlation::<SecondOrder, _, _>(hash, config, rng)
}

impl fmt::Display for CorrelationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in &self.anomalies {
            writeln!(f, "Bad value {:.6} ({} {})", a.rate, a.input_bit, a.output)?;
        }
        writeln!(
            f,
            "{} ({} trials): Max {:.6} Min {:.6} Variance {:.6} sfactor {:.6}",
            self.name, self.trials, self.max, self.min, self.variance, self.tolerance
        )
    }
}
