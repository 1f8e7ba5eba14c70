//! Run summary produced when a metrics session is finalized.
//!
//! A [`RunSummary`] is created exactly once per session and never mutated
//! afterwards. Timing statistics are in milliseconds, memory in MB.

use serde::{Deserialize, Serialize};

/// Reduction of a latency sample list.
///
/// With zero samples every field is `0.0` and `sample_count` is `0`; callers
/// use [`TimingStatistics::is_empty`] to tell "no data" from "all zeros".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStatistics {
    pub sample_count: u64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    /// Sample standard deviation (n - 1 denominator); 0 below two samples.
    pub stdev: f64,
}

impl TimingStatistics {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Garbage-collection cycle counts by generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub gen0: u64,
    pub gen1: u64,
    pub gen2: u64,
}

impl CollectionCounts {
    /// Per-generation delta against an earlier reading, floored at zero.
    pub fn since(&self, baseline: &CollectionCounts) -> CollectionCounts {
        CollectionCounts {
            gen0: self.gen0.saturating_sub(baseline.gen0),
            gen1: self.gen1.saturating_sub(baseline.gen1),
            gen2: self.gen2.saturating_sub(baseline.gen2),
        }
    }

    pub fn total(&self) -> u64 {
        self.gen0 + self.gen1 + self.gen2
    }
}

/// Point-in-time resource sample taken during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Milliseconds since the session started.
    pub elapsed_ms: f64,
    pub rss_mb: f64,
    pub vms_mb: f64,
    pub rss_delta_mb: f64,
    pub vms_delta_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_system_mb: Option<f64>,
    /// Collections since session start, when the runtime has a collector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<CollectionCounts>,
    /// Process CPU utilisation since the previous snapshot (0-100).
    pub cpu_percent: f64,
    pub thread_count: u32,
}

/// Memory movement over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss_delta_mb: f64,
    pub vms_delta_mb: f64,
    pub peak_rss_mb: f64,
    pub peak_vms_mb: f64,
}

/// CPU utilisation aggregated across snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub average_percent: f64,
    pub max_percent: f64,
}

/// Canonical reduction of a finished metrics session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub iteration_count: u64,
    pub total_elapsed_ms: f64,
    pub statistics: TimingStatistics,
    pub memory: MemoryUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<CollectionCounts>,
    pub cpu: CpuUsage,
    #[serde(default)]
    pub snapshots: Vec<ResourceSnapshot>,
}
