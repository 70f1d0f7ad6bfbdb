use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use cyclescan::def::{DEFAULT_QUEUE_CAPACITY, SMALL_CYCLE_THRESHOLD};
use cyclescan::{config::available_workers, Algorithm, Config, LargeCycleKey, Mode};

#[derive(Subcommand, Debug, Serialize, Clone)]
pub enum Command {
    /// Galois LFSR over all 2^bits register states
    Lfsr {
        #[arg(long)]
        bits: usize,

        /// Feedback taps in hex; defaults to a maximal-length polynomial
        #[arg(long)]
        taps: Option<String>,
    },
    /// x -> (multiplier * x + increment) mod size
    Affine {
        #[arg(long)]
        size: u64,

        #[arg(long)]
        multiplier: u64,

        #[arg(long, default_value_t = 0)]
        increment: u64,
    },
}

#[derive(Parser, Debug, Serialize, Clone)]
#[command(name = "cyclescan", about = "Finds every cycle of a permutation in parallel")]
pub struct CycleScanCli {
    #[command(subcommand)]
    pub command: Command,

    /// Number of workers, 0 for the available parallelism
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Partitioning mode: "static", "dynamic" or "auto"
    #[arg(long, default_value = "auto")]
    pub mode: String,

    /// Period finding: "enumeration", "floyd", "brent" or "auto"
    #[arg(long, default_value = "auto")]
    pub algorithm: String,

    /// Elements per dynamic batch, 0 for adaptive sizing
    #[arg(long, default_value_t = 0)]
    pub batch_size: u64,

    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Budget for the parallel run before falling back
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Keep every member of every cycle
    #[arg(long)]
    pub full_sequence: bool,

    #[arg(long, default_value_t = SMALL_CYCLE_THRESHOLD)]
    pub small_cycle_threshold: u64,

    /// Key for large cycles: "min_member" or "discovery"
    #[arg(long, default_value = "min_member")]
    pub large_cycle_key: String,

    /// Fail instead of rerunning sequentially when the parallel run breaks
    #[arg(long)]
    pub no_fallback: bool,

    /// Measure this many starts with all three algorithms before the run
    #[arg(long, default_value_t = 0)]
    pub cross_check: usize,

    /// Output filename for the JSON report
    #[arg(long, default_value = "")]
    pub output: String,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CycleScanCli {
    pub fn build_config(&self) -> anyhow::Result<Config> {
        let mode = Mode::from_str(&self.mode).with_context(|| format!("invalid mode: {}", self.mode))?;
        let algorithm = Algorithm::from_str(&self.algorithm)
            .with_context(|| format!("invalid algorithm: {}", self.algorithm))?;
        let large_cycle_key = LargeCycleKey::from_str(&self.large_cycle_key)
            .with_context(|| format!("invalid large cycle key: {}", self.large_cycle_key))?;
        if self.queue_capacity == 0 {
            bail!("queue capacity must be positive");
        }
        let workers = if self.workers == 0 {
            available_workers()
        } else {
            self.workers
        };
        let batch_size = (self.batch_size > 0).then_some(self.batch_size);
        Ok(Config::new(
            workers,
            mode,
            algorithm,
            batch_size,
            self.queue_capacity,
            self.full_sequence,
            self.small_cycle_threshold,
            large_cycle_key,
            Duration::from_secs(self.timeout_secs),
            !self.no_fallback,
        ))
    }
}

/// Parses `0x`-prefixed or bare hex.
pub fn parse_taps(taps: &str) -> anyhow::Result<u64> {
    let digits = taps
        .strip_prefix("0x")
        .or_else(|| taps.strip_prefix("0X"))
        .unwrap_or(taps);
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid taps: {}", taps))
}
