use agentperf::{AnalysisDispatcher, BackendError, ChatBackend, ChatReply};
use agentperf_common::{ArtifactMetrics, MetricsArtifact, StatisticsBlock, TestInfo, TestMode};
use agentperf_telemetry::{ProbeError, ResourceProbe, ResourceSample};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_thread_ids(true)
                    .json(),
            )
            .with(filter)
            .init();
    });
}

// ── Artifacts on disk ────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn artifact(
    language: &str,
    provider: &str,
    mode: TestMode,
    iterations: u64,
    mean_ms: f64,
) -> MetricsArtifact {
    MetricsArtifact {
        test_info: TestInfo {
            language: Some(language.to_string()),
            framework: Some(format!("{language}-agents")),
            provider: Some(provider.to_string()),
            model: Some("llama3.2".to_string()),
            test_mode: mode,
            timestamp: Some("2024-01-01T00:00:00Z".to_string()),
            warmup_successful: true,
            ..TestInfo::default()
        },
        metrics: ArtifactMetrics {
            total_iterations: Some(iterations),
            total_execution_time_ms: Some(mean_ms * iterations as f64),
            average_time_per_iteration_ms: Some(mean_ms),
            min_iteration_time_ms: Some(mean_ms / 2.0),
            max_iteration_time_ms: Some(mean_ms * 2.0),
            statistics: Some(StatisticsBlock {
                mean: mean_ms,
                median: mean_ms,
                min: mean_ms / 2.0,
                max: mean_ms * 2.0,
                p90: mean_ms * 1.5,
                p95: mean_ms * 1.7,
                p99: mean_ms * 1.9,
                std_dev: 1.0,
            }),
            ..ArtifactMetrics::default()
        },
        ..MetricsArtifact::default()
    }
}

/// Write `artifact` as `dir/name` and return the path.
#[allow(dead_code)]
pub fn write_artifact(dir: &Path, name: &str, artifact: &MetricsArtifact) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, artifact.to_pretty_json().unwrap()).unwrap();
    path
}

// ── Fakes ────────────────────────────────────────────────────────────────

/// Probe whose clock advances 10 ms per sample with a steady 1 ms of CPU.
#[allow(dead_code)]
pub struct SteadyProbe {
    origin: Instant,
    samples: u64,
}

#[allow(dead_code)]
impl SteadyProbe {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            samples: 0,
        }
    }
}

impl ResourceProbe for SteadyProbe {
    fn sample(&mut self) -> Result<ResourceSample, ProbeError> {
        let n = self.samples;
        self.samples += 1;
        Ok(ResourceSample {
            taken_at: self.origin + Duration::from_millis(10 * n),
            rss_bytes: (100 + n) * 1024 * 1024,
            vms_bytes: 400 * 1024 * 1024,
            peak_rss_bytes: None,
            peak_vms_bytes: None,
            cpu_time: Duration::from_millis(n),
            threads: 2,
            available_system_bytes: None,
            collections: None,
        })
    }

    fn logical_cores(&self) -> u32 {
        1
    }
}

/// Backend that fails on chosen call numbers (1-based, warmup is call 1).
#[allow(dead_code)]
pub struct ScriptedBackend {
    calls: AtomicU64,
    fail_on: Vec<u64>,
    first_token_ms: Option<f64>,
}

#[allow(dead_code)]
impl ScriptedBackend {
    pub fn new(fail_on: Vec<u64>, first_token_ms: Option<f64>) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_on,
            first_token_ms,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatBackend for ScriptedBackend {
    fn complete(&self, _prompt: &str) -> Result<ChatReply, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(BackendError::EmptyResponse);
        }
        Ok(ChatReply {
            text: format!("reply {call}"),
            time_to_first_token_ms: self.first_token_ms,
        })
    }
}

/// Dispatcher that answers the first `answers` prompts and records them all.
#[allow(dead_code)]
pub struct RecordingDispatcher {
    answers: usize,
    pub prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingDispatcher {
    pub fn new(answers: usize) -> Self {
        Self {
            answers,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl AnalysisDispatcher for RecordingDispatcher {
    fn analyze(&self, prompt: &str) -> Option<String> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        (prompts.len() <= self.answers).then(|| format!("analysis #{}", prompts.len()))
    }

    fn describe(&self) -> String {
        "RECORDING (test)".to_string()
    }
}
