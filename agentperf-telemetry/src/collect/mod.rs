//! Resource probes.
//!
//! A [`ResourceProbe`] produces point-in-time [`ResourceSample`]s for the
//! current process. [`ProcProbe`] reads Linux procfs; tests substitute
//! scripted probes.

pub mod cpu;
pub mod memory;
pub mod process;

use agentperf_common::CollectionCounts;
use std::time::{Duration, Instant};
use thiserror::Error;

use self::memory::SystemMemory;
use self::process::{ProcessCpuTime, ProcessStatus};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Process(#[from] process::ProcessError),

    #[error(transparent)]
    Memory(#[from] memory::MemoryError),

    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

/// Raw counters captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub taken_at: Instant,
    pub rss_bytes: u64,
    pub vms_bytes: u64,
    /// Kernel-tracked high-water marks, if exposed.
    pub peak_rss_bytes: Option<u64>,
    pub peak_vms_bytes: Option<u64>,
    /// Cumulative user + system CPU time.
    pub cpu_time: Duration,
    pub threads: u32,
    pub available_system_bytes: Option<u64>,
    /// Managed-runtime collection counters; `None` for native processes.
    pub collections: Option<CollectionCounts>,
}

/// Source of resource samples for the current process.
pub trait ResourceProbe {
    fn sample(&mut self) -> Result<ResourceSample, ProbeError>;

    /// Logical cores used to normalize CPU utilization.
    fn logical_cores(&self) -> u32;
}

/// Probe backed by /proc/self and /proc/meminfo.
#[derive(Debug, Clone)]
pub struct ProcProbe {
    logical_cores: u32,
}

impl ProcProbe {
    pub fn new() -> Self {
        let logical_cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self { logical_cores }
    }
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ProcProbe {
    fn sample(&mut self) -> Result<ResourceSample, ProbeError> {
        let taken_at = Instant::now();
        let status = ProcessStatus::read_from_proc()?;
        let cpu = ProcessCpuTime::read_from_proc()?;
        // System memory is informational; a read failure only drops the field.
        let available_system_bytes = SystemMemory::read_from_proc()
            .ok()
            .map(|m| m.available_bytes());

        Ok(ResourceSample {
            taken_at,
            rss_bytes: status.vm_rss_kb * 1024,
            vms_bytes: status.vm_size_kb * 1024,
            peak_rss_bytes: status.vm_hwm_kb.map(|kb| kb * 1024),
            peak_vms_bytes: status.vm_peak_kb.map(|kb| kb * 1024),
            cpu_time: cpu.as_duration(),
            threads: status.threads,
            available_system_bytes,
            collections: None,
        })
    }

    fn logical_cores(&self) -> u32 {
        self.logical_cores
    }
}
