//! Per-run latency accounting
//!
//! Only completed runs are recorded; superseded runs never reach this module.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::Result;

/// Average latencies over all recorded runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Number of recorded runs
    pub runs: u64,
    /// Mean seconds from run start to context ready
    pub avg_retrieval_time: f64,
    /// Mean seconds from run start to completion
    pub avg_total_time: f64,
}

/// Accumulates run count and cumulative latencies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsAccumulator {
    runs: u64,
    total_retrieval_time: f64,
    total_time: f64,
}

/// On-disk shape written by [`MetricsAccumulator::dump`]
#[derive(Serialize)]
struct MetricsRecord {
    runs: u64,
    total_retrieval_time: f64,
    total_time: f64,
    #[serde(flatten)]
    averages: Option<Averages>,
}

#[derive(Serialize)]
struct Averages {
    avg_retrieval_time: f64,
    avg_total_time: f64,
}

impl MetricsAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed run
    pub fn record(&mut self, retrieval_latency: Duration, total_latency: Duration) {
        self.runs += 1;
        self.total_retrieval_time += retrieval_latency.as_secs_f64();
        self.total_time += total_latency.as_secs_f64();
    }

    /// Number of recorded runs
    #[must_use]
    pub const fn runs(&self) -> u64 {
        self.runs
    }

    /// Cumulative retrieval latency in seconds
    #[must_use]
    pub const fn total_retrieval_time(&self) -> f64 {
        self.total_retrieval_time
    }

    /// Cumulative end-to-end latency in seconds
    #[must_use]
    pub const fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Average latencies, or `None` before the first run
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> Option<MetricsSummary> {
        if self.runs == 0 {
            return None;
        }

        let runs = self.runs as f64;
        Some(MetricsSummary {
            runs: self.runs,
            avg_retrieval_time: self.total_retrieval_time / runs,
            avg_total_time: self.total_time / runs,
        })
    }

    /// Write counts and averages as pretty JSON to `path`
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the file write fails
    pub fn dump(&self, path: &Path) -> Result<()> {
        let record = MetricsRecord {
            runs: self.runs,
            total_retrieval_time: self.total_retrieval_time,
            total_time: self.total_time,
            averages: self.summary().map(|s| Averages {
                avg_retrieval_time: s.avg_retrieval_time,
                avg_total_time: s.avg_total_time,
            }),
        };

        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), runs = self.runs, "dumped metrics");
        Ok(())
    }
}
