//! LaneHash validation harness
//! Runs the throughput benchmark, then the distinctness, avalanche and bit-correlation
//! tests, printing every report to stdout. Anomalies are reported, never fatal.

use clap::Parser;
use lanehash::avalanche::{run_avalanche, AvalancheConfig};
use lanehash::correlation::{first_order, second_order, CorrelationConfig};
use lanehash::distinct::run_distinctness;
use lanehash::throughput::{
    run_throughput, run_throughput_parallel, ThroughputConfig, ThroughputReport,
};
use lanehash::{hash, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Statistical validation of the LaneHash function", long_about = None)]
struct Args {
    /// Trials per correlation test
    #[arg(long, default_value_t = 1_000_000)]
    trials: u64,
    /// Random key size in bytes for the correlation tests
    #[arg(long, default_value_t = 32)]
    key_size: usize,
    /// Seed for the correlation keys; drawn from OS entropy when absent
    #[arg(long)]
    seed: Option<u64>,
    /// Bytes hashed per benchmark chunk size
    #[arg(long, default_value_t = 1 << 28)]
    budget: usize,
    /// Benchmark worker threads; 1 hashes on the main thread
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Skip the throughput benchmark
    #[arg(long, action)]
    skip_bench: bool,
    /// Also benchmark SHA-256 over the same chunk schedule
    #[arg(long, action)]
    baseline: bool,
    /// Debug-level progress logging
    #[arg(short, long, action)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn sha256_prefix(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

fn print_results_table(ours: &ThroughputReport, baseline: Option<&ThroughputReport>) {
    println!("\n╔═══════════════════════════════════════════════════════════╗");
    println!("║                    BENCHMARK RESULTS                      ║");
    println!("╠═══════════════════════════════════════════════════════════╣");
    println!("║    Chunk │ Threads │ LaneHash MB/s │ SHA-256 MB/s │ Ratio ║");
    println!("╠═══════════════════════════════════════════════════════════╣");

    for (i, r) in ours.results.iter().enumerate() {
        let sha = baseline.and_then(|b| b.results.get(i));
        match sha {
            Some(s) => println!(
                "║ {:>8} │ {:7} │ {:13.2} │ {:12.2} │ {:4.1}x ║",
                r.chunk,
                ours.threads,
                r.mb_per_sec(),
                s.mb_per_sec(),
                r.mb_per_sec() / s.mb_per_sec()
            ),
            None => println!(
                "║ {:>8} │ {:7} │ {:13.2} │ {:>12} │ {:>5} ║",
                r.chunk,
                ours.threads,
                r.mb_per_sec(),
                "-",
                "-"
            ),
        }
    }

    println!("╚═══════════════════════════════════════════════════════════╝");
    println!("Result : {}\n", ours.checksum);
}

fn benchmark(args: &Args) -> Result<()> {
    let config = ThroughputConfig {
        budget: args.budget,
        ..ThroughputConfig::default()
    };
    println!("🔥 Benchmark: {} bytes per chunk size", config.budget);

    let ours = if args.threads > 1 {
        run_throughput_parallel(hash, &config, args.threads)?
    } else {
        run_throughput(hash, &config)?
    };

    let baseline = if args.baseline {
        println!("📊 Running SHA-256 (baseline)...");
        let zeros = vec![0u8; config.chunk_sizes[0]];
        let digest = Sha256::digest(&zeros);
        println!("   digest of one chunk: {}...", hex::encode(&digest[..8]));
        Some(run_throughput(sha256_prefix, &config)?)
    } else {
        None
    };

    print_results_table(&ours, baseline.as_ref());
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("\n╔═══════════════════════════════════════════════════════════╗");
    println!("║                       LANEHASH v0.1                       ║");
    println!("║              Hash Quality Validation Harness              ║");
    println!("║                                                           ║");
    println!("║  ⚠️  NOT CRYPTOGRAPHICALLY SECURE ⚠️                        ║");
    println!("╚═══════════════════════════════════════════════════════════╝\n");

    if !args.skip_bench {
        if let Err(e) = benchmark(&args) {
            error!("benchmark skipped: {}", e);
        }
    }

    print!("{}", run_distinctness(hash));

    match run_avalanche(hash, &AvalancheConfig::default()) {
        Ok(report) => println!("{}", report),
        Err(e) => error!("avalanche test skipped: {}", e),
    }

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, "correlation keys seeded; pass --seed to replay");
    let mut rng = StdRng::seed_from_u64(seed);
    let config = CorrelationConfig {
        trials: args.trials,
        key_size: args.key_size,
    };

    match first_order(&config, &mut rng) {
        Ok(report) => print!("{}", report),
        Err(e) => error!("first-order correlation skipped: {}", e),
    }
    match second_order(&config, &mut rng) {
        Ok(report) => print!("{}", report),
        Err(e) => error!("second-order correlation skipped: {}", e),
    }
}
