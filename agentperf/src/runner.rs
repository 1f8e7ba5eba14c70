//! The timed run loop that produces a metrics artifact.

use crate::backend::ChatBackend;
use crate::session::{CancellationToken, RunProgress};
use agentperf_common::{ArtifactMetrics, MachineInfo, MetricsArtifact, TestInfo, TestMode};
use agentperf_telemetry::{
    CollectorError, MetricsCollector, ProcProbe, ResourceProbe, detect_machine_info,
};
use chrono::Utc;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_ITERATIONS: u64 = 1000;
pub const DEFAULT_SNAPSHOT_EVERY: u64 = 100;
pub const DEFAULT_PROMPT: &str = "Say hello";

#[derive(Error, Debug)]
pub enum RunError {
    #[error("test mode {0} is not supported by the run loop (expected standard or streaming)")]
    UnsupportedMode(TestMode),

    #[error("a run needs at least one iteration")]
    NoIterations,

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error("run cancelled after {completed} iterations")]
    Cancelled { completed: u64 },

    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub language: String,
    pub framework: String,
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub test_mode: TestMode,
    pub iterations: u64,
    /// Capture a resource snapshot every N iterations; 0 disables.
    pub snapshot_every: u64,
    pub output_dir: PathBuf,
    pub prompt: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            language: "rust".to_string(),
            framework: "agentperf".to_string(),
            provider: "ollama".to_string(),
            model: crate::analysis::DEFAULT_OLLAMA_MODEL.to_string(),
            endpoint: crate::analysis::DEFAULT_OLLAMA_ENDPOINT.to_string(),
            test_mode: TestMode::Standard,
            iterations: DEFAULT_ITERATIONS,
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
            output_dir: PathBuf::from("."),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), RunError> {
        if !matches!(self.test_mode, TestMode::Standard | TestMode::Streaming) {
            return Err(RunError::UnsupportedMode(self.test_mode));
        }
        if self.iterations == 0 {
            return Err(RunError::NoIterations);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub artifact_path: PathBuf,
    pub artifact: MetricsArtifact,
}

/// Run against the live process probe and detected machine descriptor.
pub fn run_session(
    config: &RunConfig,
    backend: &dyn ChatBackend,
    token: &CancellationToken,
    progress: &RunProgress,
) -> Result<RunReport, RunError> {
    config.validate()?;
    run_session_with(
        config,
        backend,
        token,
        progress,
        MetricsCollector::<ProcProbe>::new(),
        detect_machine_info(),
    )
}

/// Run with an explicit collector and machine descriptor.
///
/// A cancelled run returns [`RunError::Cancelled`] and writes nothing.
pub fn run_session_with<P: ResourceProbe>(
    config: &RunConfig,
    backend: &dyn ChatBackend,
    token: &CancellationToken,
    progress: &RunProgress,
    mut collector: MetricsCollector<P>,
    machine: MachineInfo,
) -> Result<RunReport, RunError> {
    config.validate()?;
    progress.set_total(config.iterations);

    let warmup_started = Instant::now();
    let warmup = backend.complete(&config.prompt);
    let warmup_time_ms = elapsed_ms(warmup_started);
    let warmup_successful = match &warmup {
        Ok(_) => true,
        Err(error) => {
            warn!(%error, "warmup call failed, continuing");
            false
        }
    };
    debug!(warmup_successful, warmup_time_ms, "warmup finished");

    collector.start()?;
    info!(
        iterations = config.iterations,
        mode = %config.test_mode,
        model = %config.model,
        "run started"
    );

    let mut successes = 0u64;
    let mut failures = 0u64;
    let mut first_token_ms = Vec::new();

    for iteration in 1..=config.iterations {
        if token.is_cancelled() {
            return Err(RunError::Cancelled {
                completed: iteration - 1,
            });
        }

        let started = Instant::now();
        let reply = backend.complete(&config.prompt);
        let took = elapsed_ms(started);
        match reply {
            Ok(reply) => {
                collector.record_measurement(took)?;
                first_token_ms.extend(reply.time_to_first_token_ms);
                successes += 1;
            }
            Err(error) => {
                debug!(iteration, %error, "iteration failed");
                failures += 1;
            }
        }

        if config.snapshot_every > 0 && iteration % config.snapshot_every == 0 {
            match collector.capture_snapshot() {
                Ok(_) => {}
                Err(CollectorError::Probe(error)) => {
                    warn!(iteration, %error, "resource snapshot failed");
                }
                Err(other) => return Err(other.into()),
            }
        }

        progress.advance(iteration);
    }

    if failures > 0 {
        warn!(failures, successes, "some iterations failed");
    }

    let summary = collector.finalize()?;
    let mut metrics = ArtifactMetrics::from_summary(&summary);
    metrics.total_iterations = Some(config.iterations);
    metrics.success_count = Some(successes);
    metrics.failure_count = Some(failures);
    metrics.time_to_first_token_ms = mean(&first_token_ms);

    let now = Utc::now();
    let artifact = MetricsArtifact {
        test_info: TestInfo {
            language: Some(config.language.clone()),
            framework: Some(config.framework.clone()),
            provider: Some(config.provider.clone()),
            model: Some(config.model.clone()),
            endpoint: Some(config.endpoint.clone()),
            test_mode: config.test_mode,
            timestamp: Some(now.to_rfc3339()),
            warmup_successful,
            warmup_time_ms: Some(warmup_time_ms),
        },
        machine_info: Some(MachineInfo {
            runtime_version: Some(format!("agentperf {}", env!("CARGO_PKG_VERSION"))),
            ..machine
        }),
        summary: Some(summary_line(successes, config.iterations, &metrics)),
        metrics,
    };

    std::fs::create_dir_all(&config.output_dir).map_err(|source| RunError::Write {
        path: config.output_dir.clone(),
        source,
    })?;
    let path = config.output_dir.join(artifact.file_name(&now));
    let body = artifact.to_pretty_json()?;
    std::fs::write(&path, body).map_err(|source| RunError::Write {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), successes, failures, "artifact written");

    Ok(RunReport {
        artifact_path: path,
        artifact,
    })
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn summary_line(successes: u64, iterations: u64, metrics: &ArtifactMetrics) -> String {
    match metrics.statistics {
        Some(stats) => format!(
            "{successes}/{iterations} iterations succeeded; mean {:.2} ms, p95 {:.2} ms, max {:.2} ms",
            stats.mean, stats.p95, stats.max
        ),
        None => format!("{successes}/{iterations} iterations succeeded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_batch_and_zero_iterations() {
        let config = RunConfig {
            test_mode: TestMode::Batch,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(RunError::UnsupportedMode(TestMode::Batch))));

        let config = RunConfig {
            iterations: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(RunError::NoIterations)));
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[10.0, 20.0]), Some(15.0));
    }
}
