// Command line front end for the cycle analysis engine.
// 2 sub-commands, one per built-in permutation family
// - lfsr (bits, optional taps)
// - affine (size, multiplier, increment)
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use cyclescan::{cross_check, AffineMap, Config, DomainIndex, GaloisLfsr, Supervisor, TransitionOracle};
use cyclescan_cli::common::cli::{self, Command, CycleScanCli};
use cyclescan_cli::common::report::{self, CrossCheckSummary, Summary};
use cyclescan_cli::common::utils;
use log::info;

fn run<O: TransitionOracle + 'static>(
    oracle: O,
    args: &CycleScanCli,
    config: Config,
) -> anyhow::Result<Summary> {
    let oracle = Arc::new(oracle);
    let checked = if args.cross_check > 0 {
        let n = oracle.size();
        let k = (args.cross_check as u64).min(n).max(1);
        let starts: Vec<u64> = (0..k).map(|i| i * (n / k)).collect();
        info!("cross-checking walkers on {} starts", starts.len());
        Some(CrossCheckSummary::from_checks(&cross_check(&*oracle, &starts)))
    } else {
        None
    };

    let supervisor = Supervisor::new(config);
    let result = supervisor.analyze(oracle)?;
    supervisor.shutdown();

    let mut summary = Summary::from_result(&result);
    summary.cross_check = checked;
    Ok(summary)
}

fn main() -> anyhow::Result<()> {
    let args = CycleScanCli::parse();
    utils::init_logging(&args.log_level);
    let run_start_ts = Utc::now();
    let metrics_recorder = utils::MetricsRecorder::new()?;
    let config = args.build_config()?;

    let summary = match &args.command {
        Command::Lfsr { bits, taps } => {
            let lfsr = match taps {
                Some(taps) => GaloisLfsr::with_taps(*bits, cli::parse_taps(taps)?)?,
                None => GaloisLfsr::maximal(*bits)?,
            };
            info!("LFSR with {} bits, taps {:#x}", lfsr.bit_count(), lfsr.taps());
            run(lfsr, &args, config)?
        }
        Command::Affine {
            size,
            multiplier,
            increment,
        } => {
            let map = AffineMap::new(*size, *multiplier, *increment)?;
            info!("affine map x -> {} * x + {} mod {}", multiplier, increment, size);
            run(map, &args, config)?
        }
    };
    summary.log();

    if !args.output.is_empty() {
        info!("Dumping report to {}", args.output);
        report::write_report(
            Path::new(&args.output),
            &args,
            &summary,
            metrics_recorder.snapshot_metrics(),
            run_start_ts,
            Utc::now(),
        )?;
    }
    Ok(())
}
