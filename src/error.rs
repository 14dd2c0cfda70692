//! Configuration errors for the validation procedures.
//!
//! Statistical anomalies are not errors. They are counted in the reports and the run
//! carries on.

use quick_error::quick_error;

quick_error! {
    /// A validation procedure was handed a configuration it cannot run.
    #[derive(Debug)]
    pub enum Error {
        /// Correlation trials need at least one key byte to flip.
        EmptyKey {
            display("key size must be at least one byte")
        }
        /// A procedure was asked to run zero trials.
        NoTrials {
            display("trial count must be non-zero")
        }
        /// A throughput chunk of zero bytes never consumes the budget.
        ZeroChunk {
            display("chunk size must be non-zero")
        }
        /// A chunk of `chunk` bytes does not fit in the byte budget even once.
        ChunkExceedsBudget {
            chunk: usize,
            budget: usize,
        } {
            display("chunk of {} bytes exceeds budget of {} bytes", chunk, budget)
        }
        /// An avalanche probe named a bit outside its key.
        PositionOutOfRange {
            len: usize,
            byte: usize,
            bit: u32,
        } {
            display("bit {} of byte {} is outside a {}-byte key", bit, byte, len)
        }
        /// The worker pool for the parallel benchmark could not be started.
        ThreadPool(err: rayon::ThreadPoolBuildError) {
            from()
            source(err)
            display("failed to build thread pool: {}", err)
        }
    }
}

/// Result alias used by every fallible procedure.
pub type Result<T> = std::result::Result<T, Error>;
