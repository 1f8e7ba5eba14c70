//! Stateful metrics session.
//!
//! Lifecycle: `Created -> Started -> Recording -> Finalized`. Measurements
//! move the session into `Recording`; snapshots may be taken in either
//! `Started` or `Recording`. `finalize` consumes the session's data into a
//! [`RunSummary`] exactly once.

use crate::collect::{ProbeError, ProcProbe, ResourceProbe, ResourceSample, cpu};
use crate::stats::PercentileEngine;
use agentperf_common::{BYTES_PER_MB, CpuUsage, MemoryUsage, ResourceSnapshot, RunSummary};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Created,
    Started,
    Recording,
    Finalized,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Recording => "recording",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("cannot {operation} while collector is {state}")]
    InvalidState {
        operation: &'static str,
        state: CollectorState,
    },

    #[error("measurement must be a finite, non-negative number of milliseconds, got {0}")]
    InvalidMeasurement(f64),

    #[error("resource probe failed: {0}")]
    Probe(#[from] ProbeError),
}

/// Accumulates latency measurements and periodic resource snapshots.
#[derive(Debug)]
pub struct MetricsCollector<P: ResourceProbe = ProcProbe> {
    probe: P,
    state: CollectorState,
    baseline: Option<ResourceSample>,
    last: Option<ResourceSample>,
    measurements: Vec<f64>,
    snapshots: Vec<ResourceSnapshot>,
    peak_rss_bytes: u64,
    peak_vms_bytes: u64,
}

impl MetricsCollector<ProcProbe> {
    pub fn new() -> Self {
        Self::with_probe(ProcProbe::new())
    }
}

impl Default for MetricsCollector<ProcProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ResourceProbe> MetricsCollector<P> {
    pub fn with_probe(probe: P) -> Self {
        Self {
            probe,
            state: CollectorState::Created,
            baseline: None,
            last: None,
            measurements: Vec::new(),
            snapshots: Vec::new(),
            peak_rss_bytes: 0,
            peak_vms_bytes: 0,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn snapshots(&self) -> &[ResourceSnapshot] {
        &self.snapshots
    }

    /// Capture baseline counters and the clock origin.
    ///
    /// On probe failure the collector stays in `Created`.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.state != CollectorState::Created {
            return Err(CollectorError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        let baseline = self.probe.sample()?;
        self.track_peaks(&baseline);
        debug!(
            rss_bytes = baseline.rss_bytes,
            vms_bytes = baseline.vms_bytes,
            "collector started"
        );
        self.last = Some(baseline.clone());
        self.baseline = Some(baseline);
        self.state = CollectorState::Started;
        Ok(())
    }

    pub fn record_measurement(&mut self, ms: f64) -> Result<(), CollectorError> {
        self.ensure_active("record a measurement")?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(CollectorError::InvalidMeasurement(ms));
        }
        self.measurements.push(ms);
        self.state = CollectorState::Recording;
        Ok(())
    }

    /// Sample the probe and append a snapshot relative to the baseline.
    pub fn capture_snapshot(&mut self) -> Result<&ResourceSnapshot, CollectorError> {
        self.ensure_active("capture a snapshot")?;
        let sample = self.probe.sample()?;
        let snapshot = self.snapshot_from(&sample);
        self.track_peaks(&sample);
        self.last = Some(sample);
        debug!(
            elapsed_ms = snapshot.elapsed_ms,
            rss_mb = snapshot.rss_mb,
            cpu_percent = snapshot.cpu_percent,
            "captured resource snapshot"
        );
        self.snapshots.push(snapshot);
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }

    /// Reduce the session into a [`RunSummary`].
    ///
    /// A failing final probe read is logged and the most recent sample is
    /// reused, so this only fails on an invalid state.
    pub fn finalize(&mut self) -> Result<RunSummary, CollectorError> {
        self.ensure_active("finalize")?;
        let (Some(baseline), Some(last)) = (self.baseline.clone(), self.last.clone()) else {
            return Err(CollectorError::InvalidState {
                operation: "finalize",
                state: self.state,
            });
        };

        let final_sample = match self.probe.sample() {
            Ok(sample) => sample,
            Err(error) => {
                warn!(%error, "final resource sample failed, reusing last sample");
                ResourceSample {
                    taken_at: Instant::now().max(last.taken_at),
                    ..last
                }
            }
        };
        self.track_peaks(&final_sample);

        let statistics = PercentileEngine::reduce(&self.measurements);
        let total_elapsed_ms = ms_between(&baseline, &final_sample);

        let memory = MemoryUsage {
            rss_delta_mb: delta_mb(baseline.rss_bytes, final_sample.rss_bytes),
            vms_delta_mb: delta_mb(baseline.vms_bytes, final_sample.vms_bytes),
            peak_rss_mb: self.peak_rss_bytes as f64 / BYTES_PER_MB,
            peak_vms_mb: self.peak_vms_bytes as f64 / BYTES_PER_MB,
        };

        let collections = match (&baseline.collections, &final_sample.collections) {
            (Some(start), Some(end)) => Some(end.since(start)),
            _ => None,
        };

        let cpu = if self.snapshots.is_empty() {
            let whole = self.cpu_percent_between(&baseline, &final_sample);
            CpuUsage {
                average_percent: whole,
                max_percent: whole,
            }
        } else {
            let n = self.snapshots.len() as f64;
            let sum: f64 = self.snapshots.iter().map(|s| s.cpu_percent).sum();
            let max = self
                .snapshots
                .iter()
                .map(|s| s.cpu_percent)
                .fold(0.0_f64, f64::max);
            CpuUsage {
                average_percent: sum / n,
                max_percent: max,
            }
        };

        let summary = RunSummary {
            iteration_count: self.measurements.len() as u64,
            total_elapsed_ms,
            statistics,
            memory,
            collections,
            cpu,
            snapshots: std::mem::take(&mut self.snapshots),
        };

        self.measurements.clear();
        self.last = Some(final_sample);
        self.state = CollectorState::Finalized;
        debug!(
            iterations = summary.iteration_count,
            total_elapsed_ms = summary.total_elapsed_ms,
            mean_ms = summary.statistics.mean,
            "collector finalized"
        );
        Ok(summary)
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), CollectorError> {
        match self.state {
            CollectorState::Started | CollectorState::Recording => Ok(()),
            state => Err(CollectorError::InvalidState { operation, state }),
        }
    }

    fn track_peaks(&mut self, sample: &ResourceSample) {
        let rss = sample.peak_rss_bytes.unwrap_or(0).max(sample.rss_bytes);
        let vms = sample.peak_vms_bytes.unwrap_or(0).max(sample.vms_bytes);
        self.peak_rss_bytes = self.peak_rss_bytes.max(rss);
        self.peak_vms_bytes = self.peak_vms_bytes.max(vms);
    }

    fn cpu_percent_between(&self, from: &ResourceSample, to: &ResourceSample) -> f64 {
        cpu::process_cpu_percent(
            to.cpu_time.saturating_sub(from.cpu_time),
            to.taken_at.saturating_duration_since(from.taken_at),
            self.probe.logical_cores(),
        )
    }

    fn snapshot_from(&self, sample: &ResourceSample) -> ResourceSnapshot {
        // Both are set whenever the collector is active.
        let baseline = self.baseline.as_ref().unwrap_or(sample);
        let previous = self.last.as_ref().unwrap_or(baseline);

        ResourceSnapshot {
            elapsed_ms: ms_between(baseline, sample),
            rss_mb: sample.rss_bytes as f64 / BYTES_PER_MB,
            vms_mb: sample.vms_bytes as f64 / BYTES_PER_MB,
            rss_delta_mb: delta_mb(baseline.rss_bytes, sample.rss_bytes),
            vms_delta_mb: delta_mb(baseline.vms_bytes, sample.vms_bytes),
            available_system_mb: sample
                .available_system_bytes
                .map(|b| b as f64 / BYTES_PER_MB),
            collections: match (&baseline.collections, &sample.collections) {
                (Some(start), Some(now)) => Some(now.since(start)),
                _ => None,
            },
            cpu_percent: self.cpu_percent_between(previous, sample),
            thread_count: sample.threads,
        }
    }
}

fn ms_between(from: &ResourceSample, to: &ResourceSample) -> f64 {
    to.taken_at.saturating_duration_since(from.taken_at).as_secs_f64() * 1000.0
}

fn delta_mb(from: u64, to: u64) -> f64 {
    (to as f64 - from as f64) / BYTES_PER_MB
}
