//! Throughput benchmark over fixed-size zero chunks.
//!
//! Every chunk size hashes `budget / chunk` copies of a zero buffer. Digests are summed
//! into a checksum that both keeps the work observable and pins the result: with a fixed
//! budget the checksum is fully determined by the hash function.

use std::fmt;
use std::hint::black_box;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct ThroughputConfig {
    /// Bytes hashed per chunk size.
    pub budget: usize,
    pub chunk_sizes: Vec<usize>,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            budget: 1 << 28,                                    // 256 MB
            chunk_sizes: vec![8, 32, 1 << 10, 1 << 16, 1 << 22], // 8B .. 4MB
        }
    }
}

impl ThroughputConfig {
    pub fn validate(&self) -> Result<()> {
        for &chunk in &self.chunk_sizes {
            if chunk == 0 {
                return Err(Error::ZeroChunk);
            }
            if chunk > self.budget {
                return Err(Error::ChunkExceedsBudget {
                    chunk,
                    budget: self.budget,
                });
            }
        }
        Ok(())
    }

    fn largest_chunk(&self) -> usize {
        self.chunk_sizes.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub struct ChunkResult {
    pub chunk: usize,
    pub iterations: usize,
    /// Wrapping sum of this chunk size's digests.
    pub checksum: u64,
    pub elapsed: Duration,
}

impl ChunkResult {
    pub fn bytes(&self) -> usize {
        self.chunk * self.iterations
    }

    pub fn mb_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return f64::INFINITY;
        }
        (self.bytes() as f64 / 1_000_000.0) / secs
    }
}

#[derive(Clone, Debug)]
pub struct ThroughputReport {
    pub threads: usize,
    pub results: Vec<ChunkResult>,
    /// Wrapping sum over every chunk size.
    pub checksum: u64,
}

fn measure<F>(chunk: usize, iterations: usize, work: F) -> ChunkResult
where
    F: FnOnce() -> u64,
{
    let start = Instant::now();
    let checksum = work();
    let elapsed = start.elapsed();

    let result = ChunkResult {
        chunk,
        iterations,
        checksum,
        elapsed,
    };
    debug!(
        chunk,
        iterations,
        mb_per_sec = result.mb_per_sec(),
        "chunk size done"
    );
    result
}

fn finish(threads: usize, results: Vec<ChunkResult>) -> ThroughputReport {
    let checksum = results
        .iter()
        .fold(0u64, |sum, r| sum.wrapping_add(r.checksum));
    info!(threads, checksum, "throughput benchmark finished");
    ThroughputReport {
        threads,
        results,
        checksum,
    }
}

/// Hash the chunk schedule on the calling thread.
pub fn run_throughput<H>(hash_fn: H, config: &ThroughputConfig) -> Result<ThroughputReport>
where
    H: Fn(&[u8]) -> u64,
{
    config.validate()?;
    let buf = vec![0u8; config.largest_chunk()];

    let results = config
        .chunk_sizes
        .iter()
        .map(|&chunk| {
            let data = &buf[..chunk];
            let iterations = config.budget / chunk;
            measure(chunk, iterations, || {
                let mut sum = 0u64;
                for _ in 0..iterations {
                    sum = sum.wrapping_add(hash_fn(black_box(data)));
                }
                sum
            })
        })
        .collect();

    Ok(finish(1, results))
}

/// Hash the chunk schedule on a pool of `threads` workers.
///
/// The checksum is an order-independent wrapping sum, so it matches [`run_throughput`].
pub fn run_throughput_parallel<H>(
    hash_fn: H,
    config: &ThroughputConfig,
    threads: usize,
) -> Result<ThroughputReport>
where
    H: Fn(&[u8]) -> u64 + Sync,
{
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()?;
    let buf = vec![0u8; config.largest_chunk()];

    let results = config
        .chunk_sizes
        .iter()
        .map(|&chunk| {
            let data = &buf[..chunk];
            let iterations = config.budget / chunk;
            measure(chunk, iterations, || {
                pool.install(|| {
                    (0..iterations)
                        .into_par_iter()
                        .map(|_| hash_fn(black_box(data)))
                        .reduce(|| 0, u64::wrapping_add)
                })
            })
        })
        .collect();

    Ok(finish(pool.current_num_threads(), results))
}

impl fmt::Display for ThroughputReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            writeln!(
                f,
                "{:>8} B x {:>10}: {:10.2} MB/s",
                r.chunk,
                r.iterations,
                r.mb_per_sec()
            )?;
        }
        writeln!(f, "Result : {}", self.checksum)
    }
}
