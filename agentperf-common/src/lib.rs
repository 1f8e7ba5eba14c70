//! Shared types and utilities for agentperf.
//!
//! Everything a run writes and every downstream stage reads lives here: the
//! on-disk artifact schema, the run summary a collector reduces to, and the
//! logging/configuration plumbing the binaries share.

pub mod artifact;
pub mod config;
pub mod logging;
pub mod machine;
pub mod summary;
pub mod test_mode;

pub use artifact::{
    ARTIFACT_EXTENSION, ARTIFACT_PREFIX, ArtifactFileInfo, ArtifactMetrics, CpuBlock, GarbageCollectionBlock, MemoryBlock,
    MetricsArtifact, StatisticsBlock, TestInfo, artifact_file_name, parse_artifact_filename,
};
pub use config::{EnvError, EnvParser};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use machine::MachineInfo;
pub use summary::{CollectionCounts, CpuUsage, MemoryUsage, ResourceSnapshot, RunSummary, TimingStatistics};
pub use test_mode::{TestMode, TestModeParseError};

/// Bytes per mebibyte, used by every MB conversion in the workspace.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
