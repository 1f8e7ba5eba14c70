use agentperf_common::CollectionCounts;
use agentperf_telemetry::{ProbeError, ResourceProbe, ResourceSample};
use std::collections::VecDeque;
use std::sync::Once;
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

#[allow(dead_code)]
pub fn fixture(name: &str) -> &'static str {
    match name {
        "proc_self_status.txt" => include_str!("../fixtures/proc_self_status.txt"),
        "proc_self_stat.txt" => include_str!("../fixtures/proc_self_stat.txt"),
        "proc_meminfo_sample.txt" => include_str!("../fixtures/proc_meminfo_sample.txt"),
        "proc_cpuinfo_sample.txt" => include_str!("../fixtures/proc_cpuinfo_sample.txt"),
        other => panic!("unknown fixture: {other}"),
    }
}

/// One scripted reading, relative to the probe's origin.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub at_ms: u64,
    pub rss_mb: u64,
    pub vms_mb: u64,
    pub cpu_ms: u64,
    pub gen0: Option<u64>,
}

/// Probe that replays a fixed list of readings, then fails.
#[allow(dead_code)]
pub struct ScriptedProbe {
    origin: Instant,
    readings: VecDeque<Reading>,
    cores: u32,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn new(readings: impl IntoIterator<Item = Reading>, cores: u32) -> Self {
        Self {
            origin: Instant::now(),
            readings: readings.into_iter().collect(),
            cores,
        }
    }
}

impl ResourceProbe for ScriptedProbe {
    fn sample(&mut self) -> Result<ResourceSample, ProbeError> {
        let r = self
            .readings
            .pop_front()
            .ok_or_else(|| ProbeError::Unavailable("script exhausted".to_string()))?;
        Ok(ResourceSample {
            taken_at: self.origin + Duration::from_millis(r.at_ms),
            rss_bytes: r.rss_mb * 1024 * 1024,
            vms_bytes: r.vms_mb * 1024 * 1024,
            peak_rss_bytes: None,
            peak_vms_bytes: None,
            cpu_time: Duration::from_millis(r.cpu_ms),
            threads: 4,
            available_system_bytes: Some(8 * 1024 * 1024 * 1024),
            collections: r.gen0.map(|gen0| CollectionCounts {
                gen0,
                gen1: 0,
                gen2: 0,
            }),
        })
    }

    fn logical_cores(&self) -> u32 {
        self.cores
    }
}
