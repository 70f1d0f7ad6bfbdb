use std::collections::BTreeMap;

use anyhow::anyhow;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use ordered_float::OrderedFloat;
use serde::Serialize;

pub fn init_logging(max_level: &str) {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(max_level));
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Mapping from percentile label (e.g., "p90") to value.
    pub percentiles: BTreeMap<String, f64>,
}

impl HistogramStats {
    pub fn compute(samples: &[OrderedFloat<f64>]) -> Self {
        let mut values: Vec<OrderedFloat<f64>> = samples.to_vec();
        values.sort_unstable();
        let len = values.len();
        if len == 0 {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                percentiles: BTreeMap::new(),
            };
        }

        let sum: f64 = values.iter().map(|v| v.into_inner()).sum();
        const PCTS: &[(f64, &str)] = &[(50.0, "p50"), (90.0, "p90"), (99.0, "p99"), (99.9, "p999")];
        let percentiles = PCTS
            .iter()
            .map(|(pct, label)| {
                let idx = ((pct / 100.0) * (len as f64 - 1.0)).round() as usize;
                (label.to_string(), values[idx].into_inner())
            })
            .collect();

        Self {
            count: len,
            min: values[0].into_inner(),
            max: values[len - 1].into_inner(),
            mean: sum / len as f64,
            percentiles,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MetricDump {
    /// Raw value of a counter or gauge; `None` for histograms.
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramStats>,
}

impl MetricDump {
    fn from_value(value: &DebugValue) -> Self {
        match value {
            DebugValue::Counter(v) => Self {
                value: Some(*v as f64),
                histogram: None,
            },
            DebugValue::Gauge(v) => Self {
                value: Some(v.into_inner()),
                histogram: None,
            },
            DebugValue::Histogram(samples) => Self {
                value: None,
                histogram: Some(HistogramStats::compute(samples)),
            },
        }
    }
}

/// Captures everything recorded through the `metrics` facade for the report.
pub struct MetricsRecorder {
    snapshotter: Snapshotter,
}

impl MetricsRecorder {
    /// Installs the process-wide recorder; fails if one is already installed.
    pub fn new() -> anyhow::Result<Self> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .map_err(|_| anyhow!("a metrics recorder is already installed"))?;
        Ok(Self { snapshotter })
    }

    pub fn snapshot_metrics(&self) -> BTreeMap<String, MetricDump> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(ckey, _unit, _description, value)| {
                (ckey.key().name().to_owned(), MetricDump::from_value(&value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_stats() {
        let samples: Vec<OrderedFloat<f64>> = [8.0, 2.0, 4.0, 6.0].map(OrderedFloat).to_vec();
        let stats = HistogramStats::compute(&samples);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.percentiles["p50"], 6.0);
        assert_eq!(stats.percentiles["p999"], 8.0);
        assert_eq!(HistogramStats::compute(&[]).count, 0);
    }

    #[test]
    fn test_metric_dump() {
        let counter = MetricDump::from_value(&DebugValue::Counter(3));
        assert_eq!(counter.value, Some(3.0));
        let histogram = MetricDump::from_value(&DebugValue::Histogram(vec![OrderedFloat(1.0)]));
        assert_eq!(histogram.value, None);
        assert_eq!(histogram.histogram.map(|h| h.count), Some(1));
    }
}
