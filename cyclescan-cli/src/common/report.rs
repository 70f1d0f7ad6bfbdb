use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use cyclescan::{AnalysisResult, CrossCheck, Execution};

use super::cli::CycleScanCli;
use super::utils::MetricDump;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PeriodCount {
    pub period: u64,
    pub count: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CrossCheckSummary {
    pub starts: usize,
    pub agreed: usize,
}

impl CrossCheckSummary {
    pub fn from_checks(checks: &[CrossCheck]) -> Self {
        for check in checks.iter().filter(|c| !c.agrees()) {
            warn!("walkers disagree at start {}: {:?}", check.start, check);
        }
        Self {
            starts: checks.len(),
            agreed: checks.iter().filter(|c| c.agrees()).count(),
        }
    }
}

/// What a run found, in report form.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub domain_size: u64,
    pub cycle_count: usize,
    pub period_sum: u64,
    pub max_period: u64,
    pub periods: Vec<PeriodCount>,
    pub execution: String,
    pub workers: usize,
    pub elapsed_seconds: f64,
    pub oracle_calls: u64,
    pub duplicates: u64,
    pub worker_errors: Vec<String>,
    pub batches: u64,
    pub queue_high_water: usize,
    pub queue_timeouts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_check: Option<CrossCheckSummary>,
}

fn describe(execution: &Execution) -> String {
    match execution {
        Execution::Parallel { mode } => format!("parallel ({})", mode),
        Execution::Sequential => "sequential".to_string(),
        Execution::Fallback { mode, reason } => format!("sequential fallback from {} ({})", mode, reason),
    }
}

impl Summary {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let stats = &result.stats;
        Self {
            domain_size: result.domain_size,
            cycle_count: result.canonical_cycle_count(),
            period_sum: result.period_sum,
            max_period: result.max_period,
            periods: result
                .period_histogram()
                .into_iter()
                .map(|(period, count)| PeriodCount { period, count })
                .collect(),
            execution: describe(&stats.execution),
            workers: stats.workers,
            elapsed_seconds: stats.elapsed.as_secs_f64(),
            oracle_calls: stats.walkers.oracle_calls,
            duplicates: stats.duplicates,
            worker_errors: result.errors.iter().map(|e| e.to_string()).collect(),
            batches: stats.batches,
            queue_high_water: stats.queue_high_water,
            queue_timeouts: stats.queue_timeouts,
            cross_check: None,
        }
    }

    pub fn log(&self) {
        info!(
            "{} cycles over {} elements (period sum {}), max period {}",
            self.cycle_count, self.domain_size, self.period_sum, self.max_period
        );
        for PeriodCount { period, count } in &self.periods {
            info!("  period {} x {}", period, count);
        }
        info!(
            "{} with {} workers in {:.3}s, {} oracle calls, {} duplicates",
            self.execution, self.workers, self.elapsed_seconds, self.oracle_calls, self.duplicates
        );
        for err in &self.worker_errors {
            warn!("  {}", err);
        }
        if let Some(check) = &self.cross_check {
            info!("cross-check: {}/{} starts agree", check.agreed, check.starts);
        }
    }
}

pub fn write_report(
    path: &Path,
    args: &CycleScanCli,
    summary: &Summary,
    metrics: BTreeMap<String, MetricDump>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> anyhow::Result<()> {
    let duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
    let output_json = json!({
        "cli": args,
        "command": std::env::args().collect::<Vec<_>>().join(" "),
        "timestamps": {
            "start": start.to_rfc3339(),
            "end": end.to_rfc3339(),
            "duration_seconds": duration_secs
        },
        "summary": summary,
        "metrics": metrics
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string_pretty(&output_json)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
