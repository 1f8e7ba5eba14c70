//! Metrics artifact schema.
//!
//! One artifact file is written per run and is read-only to every later
//! stage. The JSON shape follows the producer convention shared by every
//! implementation under comparison (`TestInfo` / `MachineInfo` / `Metrics`
//! with PascalCase keys). `Metrics` comes in two generations: the legacy flat
//! fields (average/min/max) and the richer `Statistics` / `Memory` /
//! `GarbageCollection` / `CPU` sub-objects. Both are optional so either can be
//! read; files written here carry both.

use crate::machine::MachineInfo;
use crate::summary::RunSummary;
use crate::test_mode::TestMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filename prefix shared by every artifact.
pub const ARTIFACT_PREFIX: &str = "metrics_";
/// Filename extension shared by every artifact.
pub const ARTIFACT_EXTENSION: &str = "json";
/// Timestamp layout used in artifact filenames and result folders.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const UNKNOWN: &str = "unknown";

/// Run metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub test_mode: TestMode,
    /// ISO-8601, kept verbatim as the producer wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub warmup_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatisticsBlock {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    #[serde(rename = "P90")]
    pub p90: f64,
    #[serde(rename = "P95")]
    pub p95: f64,
    #[serde(rename = "P99")]
    pub p99: f64,
    #[serde(alias = "StandardDeviation")]
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    #[serde(rename = "RssDeltaMB", alias = "WorkingSetDeltaMB", default)]
    pub rss_delta_mb: f64,
    #[serde(rename = "VmsDeltaMB", alias = "PrivateMemoryDeltaMB", default)]
    pub vms_delta_mb: f64,
    #[serde(rename = "PeakRssMB", alias = "PeakWorkingSetMB", default)]
    pub peak_rss_mb: f64,
    #[serde(rename = "PeakVmsMB", alias = "PeakPrivateMemoryMB", default)]
    pub peak_vms_mb: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GarbageCollectionBlock {
    #[serde(default)]
    pub gen0_collections: u64,
    #[serde(default)]
    pub gen1_collections: u64,
    #[serde(default)]
    pub gen2_collections: u64,
    #[serde(
        alias = "TotalGCPauseTimeMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_pause_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CpuBlock {
    #[serde(default)]
    pub average_cpu_percent: f64,
    #[serde(default)]
    pub max_cpu_percent: f64,
}

/// The `Metrics` object. Every field is optional; unknown keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    #[serde(rename = "TotalIterations", default, skip_serializing_if = "Option::is_none")]
    pub total_iterations: Option<u64>,
    #[serde(rename = "TotalExecutionTimeMs", default, skip_serializing_if = "Option::is_none")]
    pub total_execution_time_ms: Option<f64>,
    #[serde(
        rename = "AverageTimePerIterationMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub average_time_per_iteration_ms: Option<f64>,
    #[serde(rename = "MinIterationTimeMs", default, skip_serializing_if = "Option::is_none")]
    pub min_iteration_time_ms: Option<f64>,
    #[serde(rename = "MaxIterationTimeMs", default, skip_serializing_if = "Option::is_none")]
    pub max_iteration_time_ms: Option<f64>,
    #[serde(rename = "MedianIterationTimeMs", default, skip_serializing_if = "Option::is_none")]
    pub median_iteration_time_ms: Option<f64>,
    #[serde(rename = "StandardDeviationMs", default, skip_serializing_if = "Option::is_none")]
    pub standard_deviation_ms: Option<f64>,
    #[serde(rename = "MemoryUsedMB", default, skip_serializing_if = "Option::is_none")]
    pub memory_used_mb: Option<f64>,
    #[serde(rename = "AverageCpuUsagePercent", default, skip_serializing_if = "Option::is_none")]
    pub average_cpu_usage_percent: Option<f64>,
    #[serde(rename = "TimeToFirstTokenMs", default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_token_ms: Option<f64>,
    #[serde(rename = "SuccessCount", default, skip_serializing_if = "Option::is_none")]
    pub success_count: Option<u64>,
    #[serde(rename = "FailureCount", default, skip_serializing_if = "Option::is_none")]
    pub failure_count: Option<u64>,
    #[serde(rename = "Statistics", default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticsBlock>,
    #[serde(rename = "Memory", default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryBlock>,
    #[serde(rename = "GarbageCollection", default, skip_serializing_if = "Option::is_none")]
    pub garbage_collection: Option<GarbageCollectionBlock>,
    #[serde(rename = "CPU", default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuBlock>,
    /// Producer-specific keys this schema does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ArtifactMetrics {
    /// Fill both the legacy flat fields and the rich sub-objects.
    pub fn from_summary(summary: &RunSummary) -> Self {
        let stats = &summary.statistics;
        let has_samples = !stats.is_empty();
        let when = |value: f64| has_samples.then_some(value);

        Self {
            total_iterations: Some(summary.iteration_count),
            total_execution_time_ms: Some(summary.total_elapsed_ms),
            average_time_per_iteration_ms: when(stats.mean),
            min_iteration_time_ms: when(stats.min),
            max_iteration_time_ms: when(stats.max),
            median_iteration_time_ms: when(stats.median),
            standard_deviation_ms: when(stats.stdev),
            memory_used_mb: Some(summary.memory.rss_delta_mb),
            average_cpu_usage_percent: Some(summary.cpu.average_percent),
            statistics: has_samples.then(|| StatisticsBlock {
                mean: stats.mean,
                median: stats.median,
                min: stats.min,
                max: stats.max,
                p90: stats.p90,
                p95: stats.p95,
                p99: stats.p99,
                std_dev: stats.stdev,
            }),
            memory: Some(MemoryBlock {
                rss_delta_mb: summary.memory.rss_delta_mb,
                vms_delta_mb: summary.memory.vms_delta_mb,
                peak_rss_mb: summary.memory.peak_rss_mb,
                peak_vms_mb: summary.memory.peak_vms_mb,
            }),
            garbage_collection: summary.collections.map(|c| GarbageCollectionBlock {
                gen0_collections: c.gen0,
                gen1_collections: c.gen1,
                gen2_collections: c.gen2,
                total_pause_time_ms: None,
            }),
            cpu: Some(CpuBlock {
                average_cpu_percent: summary.cpu.average_percent,
                max_cpu_percent: summary.cpu.max_percent,
            }),
            ..Self::default()
        }
    }

    pub fn mean_ms(&self) -> Option<f64> {
        self.average_time_per_iteration_ms
            .or(self.statistics.map(|s| s.mean))
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.min_iteration_time_ms.or(self.statistics.map(|s| s.min))
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.max_iteration_time_ms.or(self.statistics.map(|s| s.max))
    }

    pub fn median_ms(&self) -> Option<f64> {
        self.median_iteration_time_ms
            .or(self.statistics.map(|s| s.median))
    }

    pub fn stdev_ms(&self) -> Option<f64> {
        self.standard_deviation_ms
            .or(self.statistics.map(|s| s.std_dev))
    }

    pub fn memory_used(&self) -> Option<f64> {
        self.memory_used_mb.or(self.memory.map(|m| m.rss_delta_mb))
    }

    pub fn average_cpu_percent(&self) -> Option<f64> {
        self.average_cpu_usage_percent
            .or(self.cpu.map(|c| c.average_cpu_percent))
    }
}

/// A complete metrics artifact as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsArtifact {
    #[serde(rename = "TestInfo", default)]
    pub test_info: TestInfo,
    #[serde(rename = "MachineInfo", default, skip_serializing_if = "Option::is_none")]
    pub machine_info: Option<MachineInfo>,
    #[serde(rename = "Metrics", default)]
    pub metrics: ArtifactMetrics,
    /// Free-text summary some producers append.
    #[serde(rename = "Summary", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl MetricsArtifact {
    pub fn language_label(&self) -> &str {
        self.test_info.language.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn provider_label(&self) -> &str {
        self.test_info.provider.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn test_mode(&self) -> TestMode {
        self.test_info.test_mode
    }

    /// Two-space indented JSON, the form embedded in comparison prompts.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Filename this artifact is written under.
    pub fn file_name(&self, written_at: &DateTime<Utc>) -> String {
        artifact_file_name(
            self.language_label(),
            self.provider_label(),
            self.test_mode(),
            written_at,
        )
    }
}

/// `metrics_{language}_{provider}_{testmode}_{timestamp}.json`, lowercased.
pub fn artifact_file_name(
    language: &str,
    provider: &str,
    mode: TestMode,
    written_at: &DateTime<Utc>,
) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}_{}_{}_{}.{ARTIFACT_EXTENSION}",
        filename_token(language),
        filename_token(provider),
        mode,
        written_at.format(FILE_TIMESTAMP_FORMAT)
    )
}

fn filename_token(label: &str) -> String {
    let token: String = label
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if token.is_empty() {
        UNKNOWN.to_string()
    } else {
        token
    }
}

/// Metadata recovered from an artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFileInfo {
    pub language: String,
    pub provider: String,
    /// `None` when the filename predates the test-mode segment.
    pub test_mode: Option<TestMode>,
    pub timestamp: String,
}

/// Parse `metrics_{language}_{provider}[_{testmode}]_{timestamp}.json`.
///
/// Accepts a bare filename or a path. Missing segments come back as
/// `"unknown"` / empty rather than failing.
pub fn parse_artifact_filename(name: &str) -> ArtifactFileInfo {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = base.strip_prefix(ARTIFACT_PREFIX).unwrap_or(base);
    let stem = stem
        .strip_suffix(&format!(".{ARTIFACT_EXTENSION}"))
        .unwrap_or(stem);
    let parts: Vec<&str> = stem.split('_').collect();

    let label = |idx: usize| {
        parts
            .get(idx)
            .filter(|p| !p.is_empty())
            .map_or_else(|| UNKNOWN.to_string(), |p| (*p).to_string())
    };

    let mut info = ArtifactFileInfo {
        language: label(0),
        provider: label(1),
        test_mode: None,
        timestamp: String::new(),
    };

    if parts.len() >= 4 {
        match parts[2].parse::<TestMode>() {
            Ok(mode) => {
                info.test_mode = Some(mode);
                info.timestamp = parts[3..].join("_");
            }
            Err(_) => info.timestamp = parts[2..].join("_"),
        }
    } else if parts.len() == 3 {
        info.timestamp = parts[2].to_string();
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{CpuUsage, MemoryUsage, TimingStatistics};
    use chrono::TimeZone;

    fn sample_summary() -> RunSummary {
        RunSummary {
            iteration_count: 4,
            total_elapsed_ms: 105.5,
            statistics: TimingStatistics {
                sample_count: 4,
                mean: 25.0,
                median: 25.0,
                min: 10.0,
                max: 40.0,
                p90: 37.0,
                p95: 38.5,
                p99: 39.7,
                stdev: 12.909944487358056,
            },
            memory: MemoryUsage {
                rss_delta_mb: 1.5,
                vms_delta_mb: 4.0,
                peak_rss_mb: 20.25,
                peak_vms_mb: 300.0,
            },
            collections: None,
            cpu: CpuUsage {
                average_percent: 12.5,
                max_percent: 30.0,
            },
            snapshots: Vec::new(),
        }
    }

    #[test]
    fn test_from_summary_fills_both_generations() {
        let metrics = ArtifactMetrics::from_summary(&sample_summary());
        assert_eq!(metrics.total_iterations, Some(4));
        assert_eq!(metrics.average_time_per_iteration_ms, Some(25.0));
        assert_eq!(metrics.statistics.map(|s| s.p90), Some(37.0));
        assert_eq!(metrics.memory.map(|m| m.peak_rss_mb), Some(20.25));
        assert_eq!(metrics.garbage_collection, None);
        assert_eq!(metrics.cpu.map(|c| c.max_cpu_percent), Some(30.0));
    }

    #[test]
    fn test_from_summary_without_samples_leaves_timing_absent() {
        let mut summary = sample_summary();
        summary.iteration_count = 0;
        summary.statistics = TimingStatistics::default();
        let metrics = ArtifactMetrics::from_summary(&summary);
        assert_eq!(metrics.statistics, None);
        assert_eq!(metrics.mean_ms(), None);
        assert_eq!(metrics.total_iterations, Some(0));
    }

    #[test]
    fn test_legacy_shape_with_unknown_keys() {
        let json = r#"{
            "TestInfo": {"Language": "CSharp", "Provider": "Ollama", "WarmupTimeMs": 812.4},
            "Metrics": {
                "TotalIterations": 10,
                "TotalExecutionTimeMs": 5120,
                "AverageTimePerIterationMs": 512.0,
                "MinIterationTimeMs": 480.5,
                "MaxIterationTimeMs": 601.25,
                "MemoryUsedMB": 3.5,
                "IterationsPerSecond": 1.95
            }
        }"#;
        let artifact: MetricsArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.test_mode(), TestMode::Standard);
        assert_eq!(artifact.language_label(), "CSharp");
        assert_eq!(artifact.metrics.total_execution_time_ms, Some(5120.0));
        assert_eq!(artifact.metrics.mean_ms(), Some(512.0));
        assert_eq!(artifact.metrics.median_ms(), None);
        assert_eq!(
            artifact.metrics.extra.get("IterationsPerSecond"),
            Some(&serde_json::json!(1.95))
        );
        assert_eq!(artifact.machine_info, None);
    }

    #[test]
    fn test_rich_shape_accepts_dotnet_aliases() {
        let json = r#"{
            "TestInfo": {"Language": "dotnet", "TestMode": "streaming"},
            "Metrics": {
                "Statistics": {"Mean": 5, "Median": 4, "Min": 1, "Max": 9,
                               "P90": 8, "P95": 8.5, "P99": 8.9, "StandardDeviation": 2.5},
                "Memory": {"WorkingSetDeltaMB": 12.0, "PeakWorkingSetMB": 80.0},
                "GarbageCollection": {"Gen0Collections": 3, "TotalGCPauseTimeMs": 1.25}
            }
        }"#;
        let artifact: MetricsArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.test_mode(), TestMode::Streaming);
        assert_eq!(artifact.metrics.stdev_ms(), Some(2.5));
        assert_eq!(artifact.metrics.memory_used(), Some(12.0));
        let gc = artifact.metrics.garbage_collection.unwrap();
        assert_eq!(gc.gen0_collections, 3);
        assert_eq!(gc.total_pause_time_ms, Some(1.25));
    }

    #[test]
    fn test_file_name_convention() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let name = artifact_file_name("Rust", "Ollama", TestMode::Standard, &at);
        assert_eq!(name, "metrics_rust_ollama_standard_20240101_000100.json");
    }

    #[test]
    fn test_parse_filename_with_mode() {
        let info = parse_artifact_filename("results/metrics_go_ollama_standard_20240101_000000.json");
        assert_eq!(info.language, "go");
        assert_eq!(info.provider, "ollama");
        assert_eq!(info.test_mode, Some(TestMode::Standard));
        assert_eq!(info.timestamp, "20240101_000000");
    }

    #[test]
    fn test_parse_filename_without_mode() {
        let info = parse_artifact_filename("metrics_dotnet_ollama_20240101_120000.json");
        assert_eq!(info.test_mode, None);
        assert_eq!(info.timestamp, "20240101_120000");

        let short = parse_artifact_filename("metrics_python.json");
        assert_eq!(short.language, "python");
        assert_eq!(short.provider, "unknown");
        assert_eq!(short.timestamp, "");
    }
}
